use serde::{Deserialize, Serialize};

/// Id of the seeded LaTeX file type.
pub const DEFAULT_FILE_TYPE_ID: &str = "type-tex";
pub const DEFAULT_FILE_TYPE_NAME: &str = "LaTeX File";
pub const DEFAULT_FILE_TYPE_FOLDER: &str = "tex_files";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileType {
    pub id: String,
    pub name: String,
    pub folder_name: String,
    pub solvable: Option<bool>,
    /// Parent file type, if this one is a specialisation.
    pub belongs_to: Option<String>,
    pub description: Option<String>,
}
