use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::chapters::resolve_chapter;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{
    chapter_name_or_default, CreateFileInput, DocumentFile, FileEntry, DEFAULT_FIELD_ID,
    DEFAULT_FILE_TYPE_ID, LATEX_FILE_KIND,
};

fn row_to_entry(row: &Row) -> rusqlite::Result<FileEntry> {
    Ok(FileEntry {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        file_type: LATEX_FILE_KIND.to_string(),
        chapter: row.get(3)?,
    })
}

fn row_to_document(row: &Row) -> rusqlite::Result<DocumentFile> {
    Ok(DocumentFile {
        id: row.get(0)?,
        file_type_id: row.get(1)?,
        field_id: row.get(2)?,
        difficulty: row.get(3)?,
        path: row.get(4)?,
        date: row.get(5)?,
        solved_proved: row.get(6)?,
        bibliography: row.get(7)?,
        content: row.get(8)?,
        preamble: row.get(9)?,
        build_command: row.get(10)?,
        description: row.get(11)?,
        chapter: row.get(12)?,
    })
}

impl Database {
    /// Every file with its chapter name, ordered by chapter then path.
    /// Files without a chapter sort first.
    pub fn list_files(&self) -> Result<Vec<FileEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT df.id, df.path, df.content, c.name
                 FROM document_files df
                 LEFT JOIN chapter_memberships cm ON cm.file_id = df.id
                 LEFT JOIN chapters c ON c.id = cm.chapter_id
                 ORDER BY c.name ASC, df.path ASC",
            )?;
            let files = stmt
                .query_map([], row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(files)
        })
    }

    pub fn get_file(&self, id: &str) -> Result<DocumentFile> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT df.id, df.file_type_id, df.field_id, df.difficulty, df.path, df.date,
                        df.solved_proved, df.bibliography, df.content, df.preamble,
                        df.build_command, df.description, c.name
                 FROM document_files df
                 LEFT JOIN chapter_memberships cm ON cm.file_id = df.id
                 LEFT JOIN chapters c ON c.id = cm.chapter_id
                 WHERE df.id = ?1
                 LIMIT 1",
                [id],
                row_to_document,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("file {}", id)))
        })
    }

    /// Create a file and attach it to its chapter in one transaction.
    ///
    /// The chapter is looked up by name and created under the default field
    /// when missing. A blank chapter means [`crate::models::UNCATEGORIZED_CHAPTER`].
    /// Every file is stored with the seeded LaTeX type; the requested `type`
    /// is accepted for wire compatibility and not persisted.
    pub fn create_file(&self, input: CreateFileInput) -> Result<FileEntry> {
        let chapter = chapter_name_or_default(input.chapter.as_deref()).to_string();
        let id = Uuid::new_v4().to_string();

        let result = self.with_transaction(|tx| {
            let chapter_id = resolve_chapter(tx, &chapter)?;
            tx.execute(
                "INSERT INTO document_files (id, path, content, file_type_id, field_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, input.title, input.content, DEFAULT_FILE_TYPE_ID, DEFAULT_FIELD_ID],
            )?;
            tx.execute(
                "INSERT INTO chapter_memberships (file_id, chapter_id) VALUES (?1, ?2)",
                params![id, chapter_id],
            )?;
            Ok(())
        });

        if let Err(e) = &result {
            tracing::error!("Create file '{}' failed: {}", input.title, e);
        }
        result?;

        tracing::info!("Created file {} in chapter '{}'", id, chapter);
        Ok(FileEntry {
            id,
            title: input.title,
            content: input.content,
            file_type: LATEX_FILE_KIND.to_string(),
            chapter: Some(chapter),
        })
    }

    /// Overwrite a file's content. Returns `false` when no file has that id.
    pub fn update_file_content(&self, id: &str, content: &str) -> Result<bool> {
        let changed = self.with_connection(|conn| {
            Ok(conn.execute(
                "UPDATE document_files SET content = ?1 WHERE id = ?2",
                params![content, id],
            )?)
        })?;
        tracing::debug!("Update file {}: {} row(s) changed", id, changed);
        Ok(changed > 0)
    }

    /// Delete a file; its chapter memberships go with it.
    pub fn delete_file(&self, id: &str) -> Result<bool> {
        let changed = self.with_connection(|conn| {
            Ok(conn.execute("DELETE FROM document_files WHERE id = ?1", [id])?)
        })?;
        tracing::debug!("Delete file {}: {} row(s) changed", id, changed);
        Ok(changed > 0)
    }
}
