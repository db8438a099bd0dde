//! # oslocfg-core
//!
//! Typed configuration options parsed from the command line and INI style
//! config files.
//!
//! ## Overview
//!
//! - [`Opt`] / [`OptGroup`] describe options: type, default, help, flags
//! - [`ConfigOpts`] registers them, parses arguments and files, and
//!   resolves values (override, command line, files, defaults)
//! - [`ini`] is the config file parser
//! - [`generator`] writes commented sample config files
//!
//! ## Example
//!
//! ```no_run
//! use oslocfg_core::{ConfigOpts, Opt, OptGroup, ParseOptions};
//!
//! # fn main() -> oslocfg_core::Result<()> {
//! let mut conf = ConfigOpts::new();
//! conf.register_cli_opt(Opt::boolean("debug").default_value(false), None)?;
//! conf.register_group(OptGroup::new("database"));
//! conf.register_opt(Opt::string("connection"), Some("database"))?;
//!
//! conf.parse(ParseOptions::new(std::env::args().skip(1)).project("demo"))?;
//! let url = conf.get_str(Some("database"), "connection")?;
//! # let _ = url;
//! # Ok(())
//! # }
//! ```

mod cli;
pub mod conf;
pub mod error;
pub mod generator;
pub mod ini;
pub mod opt;
pub mod types;
pub mod value;

pub use conf::{
    CONFIG_DIR_OPT, CONFIG_FILE_OPT, ConfigOpts, MutateHook, MutatedOpt, ParseOptions,
    config_opts, find_config_dirs, find_config_files,
};
pub use error::{OsloError, Result};
pub use generator::{GroupListing, OptRegistry, builtin_registry, generate};
pub use ini::{IniDocument, ParseError, Section};
pub use opt::{DEFAULT_GROUP, DeprecatedOpt, Opt, OptGroup, SECRET_MASK};
pub use types::{
    DictType, FloatType, IntegerType, IpVersion, ListType, OptType, StringType, ValueError,
};
pub use value::Value;
