//! # CLI Commands
//!
//! Handlers behind the `oslocfg` subcommands. Each writes its report to
//! the given writer so tests can capture it.

use oslocfg_core::generator::{self, builtin_registry};
use oslocfg_core::{ConfigOpts, IniDocument, OsloError, ParseError, ParseOptions};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Program name used when the generator parses its own arguments.
pub const GENERATOR_PROG: &str = "oslocfg-generator";

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] OsloError),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// HELPERS
// =============================================================================

fn load(path: &Path) -> Result<IniDocument, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    IniDocument::parse(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Sections of one checked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    /// Section name -> number of keys.
    pub sections: BTreeMap<String, usize>,
}

/// Merged view printed by `show --json`.
#[derive(Debug, Serialize)]
struct ShowOutput<'a> {
    files: Vec<String>,
    sections: BTreeMap<&'a str, &'a BTreeMap<String, Vec<String>>>,
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Run the sample generator with its own command line.
///
/// `args` are parsed by a `ConfigOpts` holding the generator options, so
/// `--config-file`, `--opts`, `--output-file` and `--wrap-width` all
/// work, from the command line or from a config file.
pub fn cmd_generate(args: &[String]) -> Result<(), CliError> {
    let mut conf = ConfigOpts::new();
    generator::register_cli_opts(&mut conf)?;
    conf.parse(
        ParseOptions::new(args.iter().cloned())
            .prog(GENERATOR_PROG)
            .description("Generate a sample configuration file")
            .default_config_files(Vec::<PathBuf>::new())
            .default_config_dirs(Vec::<PathBuf>::new()),
    )?;
    conf.log_opt_values(tracing::Level::DEBUG);
    generator::generate(&mut conf, &builtin_registry())?;
    Ok(())
}

/// Parse each file and report its sections. Stops at the first malformed
/// file.
pub fn cmd_check<W: Write>(files: &[PathBuf], out: &mut W) -> Result<Vec<FileSummary>, CliError> {
    let mut summaries = Vec::new();
    for path in files {
        let document = load(path)?;
        let summary = FileSummary {
            path: path.clone(),
            sections: document
                .sections()
                .map(|s| (s.name.clone(), s.entries.len()))
                .collect(),
        };
        writeln!(
            out,
            "{}: OK ({} sections)",
            path.display(),
            summary.sections.len()
        )?;
        for (name, keys) in &summary.sections {
            writeln!(out, "  [{}] {} keys", name, keys)?;
        }
        tracing::debug!(file = %path.display(), "config file checked");
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Print the merged sections of every file, later files last.
pub fn cmd_show<W: Write>(files: &[PathBuf], json: bool, out: &mut W) -> Result<(), CliError> {
    let mut merged = IniDocument::default();
    for path in files {
        merged.merge(&load(path)?);
    }

    if json {
        let output = ShowOutput {
            files: files.iter().map(|p| p.display().to_string()).collect(),
            sections: merged
                .sections()
                .map(|s| (s.name.as_str(), &s.entries))
                .collect(),
        };
        serde_json::to_writer_pretty(&mut *out, &output)?;
        writeln!(out)?;
        return Ok(());
    }

    let mut first = true;
    for section in merged.sections() {
        if !first {
            writeln!(out)?;
        }
        first = false;
        writeln!(out, "[{}]", section.name)?;
        for (key, values) in &section.entries {
            for value in values {
                writeln!(out, "{} = {}", key, value.replace('\n', "\n    "))?;
            }
        }
    }
    Ok(())
}
