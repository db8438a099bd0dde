//! # Generator Module
//!
//! Sample configuration file generation.
//!
//! Options are collected from named listers in an [`OptRegistry`]. The
//! generator's own settings are ordinary options, so they can come from
//! the command line or a config file:
//!
//! ```text
//! [DEFAULT]
//! output_file = etc/demo.conf.sample
//! wrap_width = 79
//! opts = DEFAULT:demo.common
//! opts = database:demo.db
//! ```

mod formatter;

pub use formatter::{MULTI_TYPE_NAME, OptFormatter, format_defaults, wrap};

use crate::conf::{ConfigOpts, config_opts};
use crate::opt::{DEFAULT_GROUP, Opt, OptGroup};
use crate::{OsloError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

/// Default maximum length of help lines.
pub const DEFAULT_WRAP_WIDTH: i64 = 70;

/// Produces option definitions for a group.
pub type OptLister = Box<dyn Fn() -> Vec<Opt> + Send + Sync>;

/// Adjusts option defaults before they are rendered.
pub type DefaultsHook = Box<dyn Fn(&mut [Opt]) + Send + Sync>;

/// The generator's settings.
#[must_use]
pub fn generator_opts() -> Vec<Opt> {
    vec![
        Opt::string("output-file").help("Path of the file to write to. Defaults to stdout."),
        Opt::integer("wrap-width")
            .default_value(DEFAULT_WRAP_WIDTH)
            .help("The maximum length of help lines."),
        Opt::multi_string("opts")
            .required(true)
            .default_value(Vec::<String>::new())
            .help("Option listers to include, as <group>:<lister>."),
        Opt::multi_string("updates")
            .default_value(Vec::<String>::new())
            .help("Default update hooks to run, as <group>:<hook>."),
    ]
}

/// Register the generator settings as command line options.
pub fn register_cli_opts(conf: &mut ConfigOpts) -> Result<()> {
    conf.register_cli_opts(generator_opts(), None)
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Named option listers and defaults hooks.
#[derive(Default)]
pub struct OptRegistry {
    listers: BTreeMap<String, OptLister>,
    hooks: BTreeMap<String, DefaultsHook>,
    groups: BTreeMap<String, OptGroup>,
}

impl fmt::Debug for OptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptRegistry")
            .field("listers", &self.listers.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OptRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lister<F>(&mut self, name: impl Into<String>, lister: F) -> &mut Self
    where
        F: Fn() -> Vec<Opt> + Send + Sync + 'static,
    {
        self.listers.insert(name.into(), Box::new(lister));
        self
    }

    pub fn add_hook<F>(&mut self, name: impl Into<String>, hook: F) -> &mut Self
    where
        F: Fn(&mut [Opt]) + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Box::new(hook));
        self
    }

    /// Group metadata (help text) used for section headers.
    pub fn add_group(&mut self, group: OptGroup) -> &mut Self {
        self.groups.insert(group.name.clone(), group);
        self
    }

    pub fn lister_names(&self) -> impl Iterator<Item = &str> {
        self.listers.keys().map(String::as_str)
    }

    fn group_help(&self, name: &str) -> Option<&str> {
        self.groups.get(name).and_then(|g| g.help.as_deref())
    }
}

/// The library's own options.
#[must_use]
pub fn builtin_registry() -> OptRegistry {
    let mut registry = OptRegistry::new();
    registry
        .add_lister("oslocfg.generator", generator_opts)
        .add_lister("oslocfg.conf", || config_opts(&[], &[]));
    registry
}

// =============================================================================
// LISTING
// =============================================================================

/// Options every lister contributed to one group.
#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group: String,
    pub opts: Vec<Opt>,
}

/// Split `<group>:<name>`; `default` in any case means `DEFAULT`.
fn split_entry(entry: &str) -> Result<(String, String)> {
    match entry.split_once(':') {
        Some((group, name)) if !group.is_empty() && !name.is_empty() => {
            let group = if group.eq_ignore_ascii_case(DEFAULT_GROUP) {
                DEFAULT_GROUP.to_string()
            } else {
                group.to_string()
            };
            Ok((group, name.to_string()))
        }
        _ => Err(OsloError::InvalidNamespace {
            entry: entry.to_string(),
        }),
    }
}

/// Keep the last definition of each dest at its first position.
fn dedup_by_dest(into: &mut Vec<Opt>, opts: Vec<Opt>) {
    for opt in opts {
        match into.iter_mut().find(|o| o.dest_name() == opt.dest_name()) {
            Some(existing) => *existing = opt,
            None => into.push(opt),
        }
    }
}

/// Collect the options of every `<group>:<lister>` entry, then run the
/// `<group>:<hook>` update hooks (at most one per group).
///
/// Listers feeding the same group are merged, duplicates removed by dest.
pub fn list_opts(
    registry: &OptRegistry,
    entries: &[String],
    updates: &[String],
) -> Result<Vec<GroupListing>> {
    let mut listings: Vec<GroupListing> = Vec::new();
    for entry in entries {
        let (group, name) = split_entry(entry)?;
        let lister = registry
            .listers
            .get(&name)
            .ok_or_else(|| OsloError::NoSuchLister { name: name.clone() })?;
        let opts = lister();
        match listings.iter_mut().find(|l| l.group == group) {
            Some(listing) => dedup_by_dest(&mut listing.opts, opts),
            None => {
                let mut listing = GroupListing {
                    group,
                    opts: Vec::new(),
                };
                dedup_by_dest(&mut listing.opts, opts);
                listings.push(listing);
            }
        }
    }

    let mut pending: BTreeSet<String> = listings.iter().map(|l| l.group.clone()).collect();
    for entry in updates {
        let (group, name) = split_entry(entry)?;
        let hook = registry
            .hooks
            .get(&name)
            .ok_or_else(|| OsloError::NoSuchHook { name: name.clone() })?;
        if !pending.remove(&group) {
            continue;
        }
        tracing::debug!(group = %group, hook = %name, "updating defaults");
        if let Some(listing) = listings.iter_mut().find(|l| l.group == group) {
            hook(listing.opts.as_mut_slice());
        }
    }
    Ok(listings)
}

fn write_group<W: Write>(
    formatter: &mut OptFormatter<W>,
    group: &str,
    help: Option<&str>,
    listing: Option<&GroupListing>,
) -> io::Result<()> {
    formatter.format_group(group, help)?;
    if let Some(listing) = listing {
        formatter.write(&format!("\n#\n# From {}\n#\n", listing.group))?;
        for opt in &listing.opts {
            formatter.write("\n")?;
            formatter.format(opt)?;
        }
    }
    Ok(())
}

/// Render listings as a sample file: `DEFAULT` first, then the other
/// groups alphabetically.
pub fn write_sample<W: Write>(
    out: W,
    registry: &OptRegistry,
    listings: &[GroupListing],
    wrap_width: usize,
) -> io::Result<W> {
    let mut groups: BTreeMap<&str, &GroupListing> = listings
        .iter()
        .filter(|l| !l.opts.is_empty())
        .map(|l| (l.group.as_str(), l))
        .collect();

    let mut formatter = OptFormatter::new(out, wrap_width);
    let defaults = groups.remove(DEFAULT_GROUP);
    write_group(
        &mut formatter,
        DEFAULT_GROUP,
        registry.group_help(DEFAULT_GROUP),
        defaults,
    )?;
    for (group, listing) in groups {
        formatter.write("\n\n")?;
        write_group(&mut formatter, group, registry.group_help(group), Some(listing))?;
    }
    Ok(formatter.into_inner())
}

/// Generate a sample file from the generator settings held by `conf`.
pub fn generate(conf: &mut ConfigOpts, registry: &OptRegistry) -> Result<()> {
    conf.register_opts(generator_opts(), None)?;

    let output_file = conf.get_str(None, "output-file")?;
    let wrap_width = conf
        .get_int(None, "wrap-width")?
        .unwrap_or(DEFAULT_WRAP_WIDTH);
    let wrap_width = usize::try_from(wrap_width).unwrap_or(0);
    let entries = conf.get_str_list(None, "opts")?;
    let updates = conf.get_str_list(None, "updates")?;

    let listings = list_opts(registry, &entries, &updates)?;
    match output_file {
        Some(path) => {
            let path = PathBuf::from(path);
            let io_err = |source: io::Error| OsloError::Io {
                path: path.clone(),
                source,
            };
            let file = std::fs::File::create(&path).map_err(io_err)?;
            let mut out = write_sample(io::BufWriter::new(file), registry, &listings, wrap_width)
                .map_err(io_err)?;
            out.flush().map_err(io_err)?;
            tracing::info!(file = %path.display(), "sample config written");
        }
        None => {
            let stdout = io::stdout();
            let mut out = write_sample(stdout.lock(), registry, &listings, wrap_width).map_err(
                |source| OsloError::Io {
                    path: PathBuf::from("<stdout>"),
                    source,
                },
            )?;
            out.flush().map_err(|source| OsloError::Io {
                path: PathBuf::from("<stdout>"),
                source,
            })?;
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
