use serde::{Deserialize, Serialize};

/// Chapter assigned when a file is created without one.
pub const UNCATEGORIZED_CHAPTER: &str = "Uncategorized";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chapter {
    pub id: String,
    pub name: String,
    pub field_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterSummary {
    pub id: String,
    pub name: String,
    pub field_id: String,
    pub file_count: i64,
}

/// Normalise a requested chapter name, substituting [`UNCATEGORIZED_CHAPTER`]
/// for missing or blank input.
pub fn chapter_name_or_default(chapter: Option<&str>) -> &str {
    match chapter {
        Some(name) if !name.trim().is_empty() => name,
        _ => UNCATEGORIZED_CHAPTER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_chapter_falls_back_to_uncategorized() {
        assert_eq!(chapter_name_or_default(None), UNCATEGORIZED_CHAPTER);
        assert_eq!(chapter_name_or_default(Some("")), UNCATEGORIZED_CHAPTER);
        assert_eq!(chapter_name_or_default(Some("   ")), UNCATEGORIZED_CHAPTER);
        assert_eq!(chapter_name_or_default(Some("Algebra")), "Algebra");
    }
}
