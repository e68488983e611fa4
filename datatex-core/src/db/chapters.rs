use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::Database;
use crate::error::Result;
use crate::models::{Chapter, ChapterSummary, Field, FileType, DEFAULT_FIELD_ID};

fn row_to_chapter(row: &Row) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get(0)?,
        name: row.get(1)?,
        field_id: row.get(2)?,
    })
}

pub(super) fn find_chapter_by_name(conn: &Connection, name: &str) -> Result<Option<Chapter>> {
    let chapter = conn
        .query_row(
            "SELECT id, name, field_id FROM chapters WHERE name = ?1",
            [name],
            row_to_chapter,
        )
        .optional()?;
    Ok(chapter)
}

/// Return the id of the chapter called `name`, creating it under the default
/// field if it does not exist yet.
pub(super) fn resolve_chapter(conn: &Connection, name: &str) -> Result<String> {
    if let Some(chapter) = find_chapter_by_name(conn, name)? {
        return Ok(chapter.id);
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO chapters (id, name, field_id) VALUES (?1, ?2, ?3)",
        [id.as_str(), name, DEFAULT_FIELD_ID],
    )?;
    tracing::debug!("Created chapter '{}' ({})", name, id);
    Ok(id)
}

impl Database {
    pub fn find_chapter(&self, name: &str) -> Result<Option<Chapter>> {
        self.with_connection(|conn| find_chapter_by_name(conn, name))
    }

    /// All chapters by name, with the number of files in each.
    pub fn list_chapters(&self) -> Result<Vec<ChapterSummary>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.field_id, COUNT(cm.file_id)
                 FROM chapters c
                 LEFT JOIN chapter_memberships cm ON cm.chapter_id = c.id
                 GROUP BY c.id, c.name, c.field_id
                 ORDER BY c.name ASC",
            )?;
            let chapters = stmt
                .query_map([], |row| {
                    Ok(ChapterSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        field_id: row.get(2)?,
                        file_count: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(chapters)
        })
    }

    pub fn list_fields(&self) -> Result<Vec<Field>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, description FROM fields ORDER BY name")?;
            let fields = stmt
                .query_map([], |row| {
                    Ok(Field {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(fields)
        })
    }

    pub fn list_file_types(&self) -> Result<Vec<FileType>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, folder_name, solvable, belongs_to, description
                 FROM file_types ORDER BY name",
            )?;
            let types = stmt
                .query_map([], |row| {
                    Ok(FileType {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        folder_name: row.get(2)?,
                        solvable: row.get(3)?,
                        belongs_to: row.get(4)?,
                        description: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(types)
        })
    }
}
