//! Core library for DataTeX.
//!
//! This crate provides the document store (files grouped into chapters) and
//! the LaTeX compile pipeline, independent of any transport layer (HTTP, CLI).
//!
//! # Usage
//!
//! ```no_run
//! use datatex_core::db::Database;
//! use datatex_core::models::CreateFileInput;
//!
//! let db = Database::open_default()?;
//!
//! db.create_file(CreateFileInput {
//!     title: "limits.tex".into(),
//!     content: "\\section{Limits}".into(),
//!     file_type: None,
//!     chapter: Some("Analysis".into()),
//! })?;
//!
//! let files = db.list_files()?;
//! # Ok::<(), datatex_core::Error>(())
//! ```

pub mod compiler;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

// Re-export commonly used types at crate root
pub use compiler::{CompileError, CompiledDocument, Compiler};
pub use config::{CompilerConfig, RetentionPolicy};
pub use db::Database;
pub use error::{Error, ErrorKind, Result};
