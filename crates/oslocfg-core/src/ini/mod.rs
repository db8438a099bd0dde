//! # INI Module
//!
//! Config file parsing.
//!
//! This module contains:
//! - The line-oriented parser (sections, assignments, continuations)
//! - The parsed document model consumed by `ConfigOpts`
//!
//! Note: reading files from disk stays in `conf`. This module only turns
//! text into a document (pure transformation).

mod parser;

pub use parser::*;
