use serde::{Deserialize, Serialize};

/// Id of the seeded top-level field.
pub const DEFAULT_FIELD_ID: &str = "field-universal";
pub const DEFAULT_FIELD_NAME: &str = "Universal";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}
