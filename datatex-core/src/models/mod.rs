mod chapter;
mod document_file;
mod field;
mod file_type;

pub use chapter::*;
pub use document_file::*;
pub use field::*;
pub use file_type::*;
