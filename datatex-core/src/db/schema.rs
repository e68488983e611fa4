// Chapter names are unique across all fields, not per field.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS fields (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS file_types (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    folder_name TEXT NOT NULL,
    solvable INTEGER,
    belongs_to TEXT,
    description TEXT
);

CREATE TABLE IF NOT EXISTS chapters (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    field_id TEXT NOT NULL REFERENCES fields(id) ON UPDATE CASCADE ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS document_files (
    id TEXT PRIMARY KEY NOT NULL,
    file_type_id TEXT REFERENCES file_types(id) ON UPDATE CASCADE,
    field_id TEXT REFERENCES fields(id) ON UPDATE CASCADE ON DELETE SET NULL,
    difficulty INTEGER,
    path TEXT NOT NULL,
    date TEXT,
    solved_proved TEXT,
    bibliography TEXT,
    content TEXT,
    preamble TEXT,
    build_command TEXT,
    description TEXT
);

CREATE TABLE IF NOT EXISTS chapter_memberships (
    file_id TEXT NOT NULL REFERENCES document_files(id) ON UPDATE CASCADE ON DELETE CASCADE,
    chapter_id TEXT NOT NULL REFERENCES chapters(id) ON UPDATE CASCADE ON DELETE CASCADE,
    UNIQUE (file_id, chapter_id)
);

CREATE INDEX IF NOT EXISTS idx_chapters_field ON chapters(field_id);
CREATE INDEX IF NOT EXISTS idx_memberships_chapter ON chapter_memberships(chapter_id);
"#;
