//! # Error Module
//!
//! Every failure the library can report, as a single enum.
//!
//! Variants map one-to-one onto the situations a consumer may want to
//! handle differently: registration mistakes, parse failures, missing
//! files and bad values.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across oslocfg-core.
pub type Result<T> = std::result::Result<T, OsloError>;

/// Main error type for oslocfg.
#[derive(Debug, Error)]
pub enum OsloError {
    // Registration errors
    #[error("arguments already parsed: {reason}")]
    ArgsAlreadyParsed { reason: String },

    #[error("configuration not parsed: {reason}")]
    NotParsed { reason: String },

    #[error("duplicate option: {name}")]
    DuplicateOpt { name: String },

    #[error("no such option {name} in group [{group}]")]
    NoSuchOpt { name: String, group: String },

    #[error("no such group [{group}]")]
    NoSuchGroup { group: String },

    #[error("invalid option definition {name}: {reason}")]
    InvalidOpt { name: String, reason: String },

    // Value errors
    #[error("value required for option {name} in group [{group}]")]
    RequiredOpt { name: String, group: String },

    #[error("value for option {name} in group [{group}] is not valid: {reason}")]
    InvalidValue {
        name: String,
        group: String,
        reason: String,
    },

    #[error("option {name} in group [{group}] is not a {expected}")]
    WrongType {
        name: String,
        group: String,
        expected: &'static str,
    },

    #[error("template substitution error: {0}")]
    TemplateSubstitution(String),

    // Config file errors
    #[error("Failed to find some config files: {}", join_paths(.files))]
    ConfigFilesNotFound { files: Vec<PathBuf> },

    #[error("Failed to open some config files: {}", join_paths(.files))]
    ConfigFilesPermissionDenied { files: Vec<PathBuf> },

    #[error("Failed to read config file directory: {}", .dir.display())]
    ConfigDirNotFound { dir: PathBuf },

    #[error("Failed to parse {}: {source}", .file.display())]
    ConfigFileParse {
        file: PathBuf,
        #[source]
        source: crate::ini::ParseError,
    },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Command line errors
    #[error(transparent)]
    Cli(#[from] clap::Error),

    // Generator errors
    #[error("invalid namespace entry {entry:?}: expected <group>:<name>")]
    InvalidNamespace { entry: String },

    #[error("no option lister registered as {name:?}")]
    NoSuchLister { name: String },

    #[error("no defaults hook registered as {name:?}")]
    NoSuchHook { name: String },
}

impl OsloError {
    /// Build an `InvalidValue` error for an option.
    pub(crate) fn invalid_value(
        name: impl Into<String>,
        group: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name: name.into(),
            group: group.into(),
            reason: reason.into(),
        }
    }
}

fn join_paths(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_not_found_lists_every_path() {
        let err = OsloError::ConfigFilesNotFound {
            files: vec![PathBuf::from("/a.conf"), PathBuf::from("/b.conf")],
        };
        assert_eq!(
            err.to_string(),
            "Failed to find some config files: /a.conf,/b.conf"
        );
    }

    #[test]
    fn required_opt_message_names_group() {
        let err = OsloError::RequiredOpt {
            name: "name".to_string(),
            group: "DEFAULT".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "value required for option name in group [DEFAULT]"
        );
    }
}
