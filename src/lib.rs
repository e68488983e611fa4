//! DataTeX server and command-line front end.
//!
//! The store and compiler live in `datatex-core`; this crate exposes them over
//! HTTP ([`api`]) and through the `datatex` binary.

pub mod api;

pub use datatex_core::{db, models, Compiler, CompilerConfig, Database};
