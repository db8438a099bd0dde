//! # oslocfg entry point
//!
//! Parses the command line and dispatches to the handlers in
//! [`oslocfg::cli`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oslocfg::cli::{CliError, cmd_check, cmd_generate, cmd_show};
use oslocfg::oslocfg_core::OsloError;

/// Sample config generation and config file inspection.
#[derive(Parser, Debug)]
#[command(name = "oslocfg", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a sample config file. Arguments go to the generator, e.g.
    /// `--config-file gen.conf` or `--opts DEFAULT:oslocfg.generator`.
    Generate {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Check that config files parse and summarise their sections.
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the merged contents of config files.
    Show {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print JSON instead of INI.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = match cli.command {
        Commands::Generate { args } => cmd_generate(&args),
        Commands::Check { files } => cmd_check(&files, &mut out).map(|_| ()),
        Commands::Show { files, json } => cmd_show(&files, json, &mut out),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        // --help / --version / usage errors of the generator's own parser
        Err(CliError::Config(OsloError::Cli(err))) => err.exit(),
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generate_keeps_hyphenated_args() {
        let cli = Cli::try_parse_from([
            "oslocfg",
            "generate",
            "--opts",
            "DEFAULT:oslocfg.conf",
            "--wrap-width",
            "79",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate { args } => {
                assert_eq!(args, vec!["--opts", "DEFAULT:oslocfg.conf", "--wrap-width", "79"]);
            }
            other => unreachable!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn show_requires_files() {
        assert!(Cli::try_parse_from(["oslocfg", "show"]).is_err());
        let cli = Cli::try_parse_from(["oslocfg", "-v", "show", "a.conf", "--json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Show { json: true, .. }));
    }
}
