//! # oslocfg Library
//!
//! This library exposes the oslocfg command handlers for testing.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod cli;

// Re-export oslocfg_core for convenience
pub use oslocfg_core;
