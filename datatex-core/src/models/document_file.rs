use serde::{Deserialize, Serialize};

/// Kind reported for every listed file; the store only holds LaTeX sources.
pub const LATEX_FILE_KIND: &str = "tex";

/// A stored LaTeX document with all of its metadata columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentFile {
    pub id: String,
    pub file_type_id: Option<String>,
    pub field_id: Option<String>,
    pub difficulty: Option<i64>,
    /// Path or display name of the document.
    pub path: String,
    pub date: Option<String>,
    pub solved_proved: Option<String>,
    pub bibliography: Option<String>,
    pub content: Option<String>,
    pub preamble: Option<String>,
    pub build_command: Option<String>,
    pub description: Option<String>,
    pub chapter: Option<String>,
}

/// Listing row: a file joined to its chapter name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub chapter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Accepted from clients; files are always stored as LaTeX.
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFileInput {
    pub content: String,
}
