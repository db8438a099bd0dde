//! # Conf Module
//!
//! `ConfigOpts`: the option registry and value resolver.
//!
//! Lifecycle:
//! 1. register options (plain, command line, grouped)
//! 2. `parse()` the command line and config files
//! 3. read values with `get()` and the typed getters
//!
//! Options may still be registered after parsing (except command line
//! ones): file values are looked up lazily, so late registrations see the
//! already-parsed files.
//!
//! Resolution order for a value: override, command line, config files,
//! deprecated names in config files, `set_default`, declared default.

pub(crate) mod namespace;
pub mod sources;
mod template;

pub use sources::{find_config_dirs, find_config_files};

use crate::cli::{self, CliOpt, CommandSettings};
use crate::ini::IniDocument;
use crate::opt::{DEFAULT_GROUP, Opt, OptGroup};
use crate::types::OptType;
use crate::{OsloError, Result, Value};
use namespace::{Namespace, OptKey};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::Level;

/// Built-in option naming the config files to read.
pub const CONFIG_FILE_OPT: &str = "config-file";

/// Built-in option naming the config directories to read.
pub const CONFIG_DIR_OPT: &str = "config-dir";

/// Called after `mutate_config_files` with the options that changed.
pub type MutateHook = Box<dyn Fn(&ConfigOpts, &[MutatedOpt]) + Send + Sync>;

/// The `--config-file` and `--config-dir` options.
#[must_use]
pub fn config_opts(default_files: &[PathBuf], default_dirs: &[PathBuf]) -> Vec<Opt> {
    let as_values = |paths: &[PathBuf]| -> Value {
        Value::List(
            paths
                .iter()
                .map(|p| Value::Str(p.display().to_string()))
                .collect(),
        )
    };
    vec![
        Opt::multi_string(CONFIG_FILE_OPT)
            .default_value(as_values(default_files))
            .metavar("PATH")
            .help(
                "Path to a config file to use. Multiple config files can be \
                 specified, with values in later files taking precedence.",
            ),
        Opt::multi_string(CONFIG_DIR_OPT)
            .default_value(as_values(default_dirs))
            .metavar("DIR")
            .help(
                "Path to a config directory to pull `*.conf` files from. \
                 Files are parsed in sorted order after the config files.",
            ),
    ]
}

// =============================================================================
// PARSE OPTIONS
// =============================================================================

/// Arguments of [`ConfigOpts::parse`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Command line arguments, without the program name.
    pub args: Vec<String>,
    /// Project name, used to find default config files.
    pub project: Option<String>,
    /// Program name; defaults to the basename of argv[0].
    pub prog: Option<String>,
    /// Enables `--version`.
    pub version: Option<String>,
    /// Shown in `--help`.
    pub description: Option<String>,
    /// Replaces the generated usage line.
    pub usage: Option<String>,
    /// Config files read when no `--config-file` is given.
    /// `None` searches the standard locations.
    pub default_config_files: Option<Vec<PathBuf>>,
    /// Config directories read when no `--config-dir` is given.
    /// `None` searches the standard locations.
    pub default_config_dirs: Option<Vec<PathBuf>>,
    /// Check every declared default against its type.
    pub validate_default_values: bool,
}

impl ParseOptions {
    #[must_use]
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    #[must_use]
    pub fn prog(mut self, prog: impl Into<String>) -> Self {
        self.prog = Some(prog.into());
        self
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    #[must_use]
    pub fn default_config_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.default_config_files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn default_config_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.default_config_dirs = Some(dirs.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn validate_default_values(mut self, validate: bool) -> Self {
        self.validate_default_values = validate;
        self
    }
}

/// A mutable option whose value changed on `mutate_config_files`.
#[derive(Debug, Clone, PartialEq)]
pub struct MutatedOpt {
    pub group: String,
    pub name: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Clone)]
struct RegisteredOpt {
    opt: Opt,
    cli: bool,
}

#[derive(Debug, Clone)]
struct GroupEntry {
    group: OptGroup,
    /// dest -> option
    opts: BTreeMap<String, RegisteredOpt>,
}

impl GroupEntry {
    fn new(group: OptGroup) -> Self {
        Self {
            group,
            opts: BTreeMap::new(),
        }
    }

    fn find(&self, name: &str) -> Option<&RegisteredOpt> {
        let dest = name.replace('-', "_");
        self.opts
            .get(&dest)
            .or_else(|| self.opts.values().find(|r| r.opt.name() == name))
    }
}

/// Where the values of a resolution come from.
#[derive(Clone, Copy)]
enum View<'a> {
    /// Startup values for immutable options, reloaded ones for mutable.
    Current,
    /// A specific namespace.
    Fixed(Option<&'a Namespace>),
}

/// The option registry and value resolver.
pub struct ConfigOpts {
    groups: BTreeMap<String, GroupEntry>,
    namespace: Option<Namespace>,
    mutable_namespace: Option<Namespace>,
    overrides: BTreeMap<OptKey, Value>,
    defaults: BTreeMap<OptKey, Value>,
    settings: CommandSettings,
    project: Option<String>,
    args: Vec<String>,
    default_config_files: Vec<PathBuf>,
    default_config_dirs: Vec<PathBuf>,
    validate_default_values: bool,
    mutate_hooks: Vec<MutateHook>,
}

impl fmt::Debug for ConfigOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigOpts")
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .field("parsed", &self.is_parsed())
            .field("project", &self.project)
            .field("args", &self.args)
            .field("mutate_hooks", &self.mutate_hooks.len())
            .finish()
    }
}

impl Default for ConfigOpts {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigOpts {
    /// Create an empty registry containing only the `DEFAULT` group.
    #[must_use]
    pub fn new() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(
            DEFAULT_GROUP.to_string(),
            GroupEntry::new(OptGroup::new(DEFAULT_GROUP)),
        );
        Self {
            groups,
            namespace: None,
            mutable_namespace: None,
            overrides: BTreeMap::new(),
            defaults: BTreeMap::new(),
            settings: CommandSettings::default(),
            project: None,
            args: Vec::new(),
            default_config_files: Vec::new(),
            default_config_dirs: Vec::new(),
            validate_default_values: false,
            mutate_hooks: Vec::new(),
        }
    }

    /// Whether `parse` has run (and `clear` has not).
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        self.namespace.is_some()
    }

    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    #[must_use]
    pub fn prog(&self) -> &str {
        &self.settings.prog
    }

    /// Arguments given to the last `parse`.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Register a group. Returns `false` if it already existed.
    pub fn register_group(&mut self, group: OptGroup) -> bool {
        if self.groups.contains_key(&group.name) {
            return false;
        }
        self.groups.insert(group.name.clone(), GroupEntry::new(group));
        true
    }

    /// Register an option. Returns `false` if an equivalent option was
    /// already registered.
    pub fn register_opt(&mut self, opt: Opt, group: Option<&str>) -> Result<bool> {
        self.register(opt, group, false)
    }

    pub fn register_opts(
        &mut self,
        opts: impl IntoIterator<Item = Opt>,
        group: Option<&str>,
    ) -> Result<()> {
        for opt in opts {
            self.register(opt, group, false)?;
        }
        Ok(())
    }

    /// Register a command line option. Must happen before `parse`.
    pub fn register_cli_opt(&mut self, opt: Opt, group: Option<&str>) -> Result<bool> {
        self.register(opt, group, true)
    }

    pub fn register_cli_opts(
        &mut self,
        opts: impl IntoIterator<Item = Opt>,
        group: Option<&str>,
    ) -> Result<()> {
        for opt in opts {
            self.register(opt, group, true)?;
        }
        Ok(())
    }

    fn register(&mut self, opt: Opt, group: Option<&str>, cli: bool) -> Result<bool> {
        let group_name = group.unwrap_or(DEFAULT_GROUP).to_string();

        if opt.name().is_empty() {
            return Err(OsloError::InvalidOpt {
                name: opt.name().to_string(),
                reason: "option name must not be empty".to_string(),
            });
        }
        if cli && opt.is_positional() && matches!(opt.kind(), OptType::Boolean) {
            return Err(OsloError::InvalidOpt {
                name: opt.name().to_string(),
                reason: "boolean options cannot be positional".to_string(),
            });
        }

        if let Some(existing) = self
            .groups
            .get(&group_name)
            .and_then(|entry| entry.opts.get(opt.dest_name()))
        {
            if !existing.opt.equivalent(&opt) {
                return Err(OsloError::DuplicateOpt {
                    name: opt.name().to_string(),
                });
            }
            if cli && !existing.cli {
                if self.is_parsed() {
                    return Err(OsloError::ArgsAlreadyParsed {
                        reason: format!("cannot register CLI option {}", opt.name()),
                    });
                }
                if let Some(registered) = self
                    .groups
                    .get_mut(&group_name)
                    .and_then(|entry| entry.opts.get_mut(opt.dest_name()))
                {
                    registered.cli = true;
                }
            }
            return Ok(false);
        }

        if cli {
            if self.is_parsed() {
                return Err(OsloError::ArgsAlreadyParsed {
                    reason: format!("cannot register CLI option {}", opt.name()),
                });
            }
            let candidate = CliOpt {
                group: &group_name,
                opt: &opt,
            };
            if let Some(name) = cli::find_clash(&self.cli_opts(), &candidate, false) {
                return Err(OsloError::DuplicateOpt { name });
            }
        }

        let entry = self
            .groups
            .entry(group_name.clone())
            .or_insert_with(|| GroupEntry::new(OptGroup::new(group_name)));
        entry
            .opts
            .insert(opt.dest_name().to_string(), RegisteredOpt { opt, cli });
        Ok(true)
    }

    /// Remove an option. Not allowed once arguments are parsed.
    pub fn unregister_opt(&mut self, name: &str, group: Option<&str>) -> Result<()> {
        if self.is_parsed() {
            return Err(OsloError::ArgsAlreadyParsed {
                reason: "reset before unregistering options".to_string(),
            });
        }
        let group_name = group.unwrap_or(DEFAULT_GROUP);
        if let Some(entry) = self.groups.get_mut(group_name) {
            entry.opts.remove(&name.replace('-', "_"));
        }
        Ok(())
    }

    /// Registered groups (including `DEFAULT`).
    pub fn groups(&self) -> impl Iterator<Item = &OptGroup> {
        self.groups.values().map(|entry| &entry.group)
    }

    /// Options of a group, ordered by dest.
    pub fn group_opts(&self, group: Option<&str>) -> Result<Vec<&Opt>> {
        let entry = self.group_entry(group)?;
        Ok(entry.opts.values().map(|r| &r.opt).collect())
    }

    /// Look up an option definition.
    pub fn opt(&self, group: Option<&str>, name: &str) -> Result<&Opt> {
        self.find(group, name).map(|(_, r)| &r.opt)
    }

    fn group_entry(&self, group: Option<&str>) -> Result<&GroupEntry> {
        let group_name = group.unwrap_or(DEFAULT_GROUP);
        self.groups
            .get(group_name)
            .ok_or_else(|| OsloError::NoSuchGroup {
                group: group_name.to_string(),
            })
    }

    fn find(&self, group: Option<&str>, name: &str) -> Result<(&str, &RegisteredOpt)> {
        let entry = self.group_entry(group)?;
        entry
            .find(name)
            .map(|r| (entry.group.name.as_str(), r))
            .ok_or_else(|| OsloError::NoSuchOpt {
                name: name.to_string(),
                group: entry.group.name.clone(),
            })
    }

    /// Command line options, DEFAULT group first, registration groups sorted.
    fn cli_opts(&self) -> Vec<CliOpt<'_>> {
        let default = self.groups.get(DEFAULT_GROUP).into_iter();
        let others = self
            .groups
            .iter()
            .filter(|(name, _)| name.as_str() != DEFAULT_GROUP)
            .map(|(_, entry)| entry);
        default
            .chain(others)
            .flat_map(|entry| {
                entry
                    .opts
                    .values()
                    .filter(|r| r.cli)
                    .map(move |r| CliOpt {
                        group: entry.group.name.as_str(),
                        opt: &r.opt,
                    })
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Parsing
    // -------------------------------------------------------------------------

    /// Parse the command line and config files.
    pub fn parse(&mut self, options: ParseOptions) -> Result<()> {
        self.clear();

        let prog = options.prog.clone().unwrap_or_else(sources::default_prog);
        let project = options.project.clone();
        let default_files = options
            .default_config_files
            .clone()
            .unwrap_or_else(|| find_config_files(project.as_deref(), &prog));
        let default_dirs = options
            .default_config_dirs
            .clone()
            .unwrap_or_else(|| find_config_dirs(project.as_deref(), &prog));

        self.settings = CommandSettings {
            prog,
            version: options.version.clone(),
            description: options.description.clone(),
            usage: options.usage.clone(),
        };
        self.project = project;
        self.default_config_files = default_files.clone();
        self.default_config_dirs = default_dirs.clone();
        self.validate_default_values = options.validate_default_values;
        self.register_cli_opts(config_opts(&default_files, &default_dirs), None)?;

        let cli_values = {
            let opts = self.cli_opts();
            if let Some(name) = cli::first_clash(&self.settings, &opts) {
                return Err(OsloError::DuplicateOpt { name });
            }
            let matches = cli::build_command(&self.settings, &opts).try_get_matches_from(
                std::iter::once(self.settings.prog.clone()).chain(options.args.iter().cloned()),
            )?;
            let values = cli::collect_values(&matches, &opts);
            for cli_opt in &opts {
                let key = (cli_opt.group.to_string(), cli_opt.opt.dest_name().to_string());
                if let Some(raws) = values.get(&key) {
                    if let Err(err) = cli_opt.opt.parse_raw(raws) {
                        return Err(OsloError::invalid_value(
                            cli_opt.opt.name(),
                            cli_opt.group,
                            err.0,
                        ));
                    }
                }
            }
            values
        };

        self.args = options.args;
        let namespace = self.read_sources(cli_values)?;
        tracing::debug!(
            files = ?namespace.file_paths(),
            "configuration parsed"
        );
        self.namespace = Some(namespace);

        if self.validate_default_values {
            self.check_defaults()?;
        }
        self.check_required_opts()
    }

    /// Read config files and directories into a namespace holding `cli`.
    fn read_sources(&self, cli: BTreeMap<OptKey, Vec<String>>) -> Result<Namespace> {
        let mut namespace = Namespace::with_cli(cli);
        let default_key = |name: &str| (DEFAULT_GROUP.to_string(), name.replace('-', "_"));

        match namespace.cli_values(&default_key(CONFIG_FILE_OPT)).map(<[String]>::to_vec) {
            Some(files) => {
                for file in files {
                    namespace.read_file(&sources::fixpath(file))?;
                }
            }
            None => {
                for file in &self.default_config_files {
                    namespace.read_file(&sources::fixpath(file))?;
                }
            }
        }

        match namespace.cli_values(&default_key(CONFIG_DIR_OPT)).map(<[String]>::to_vec) {
            Some(dirs) => {
                for dir in dirs {
                    namespace.read_dir(&sources::fixpath(dir), true)?;
                }
            }
            None => {
                for dir in &self.default_config_dirs {
                    namespace.read_dir(&sources::fixpath(dir), false)?;
                }
            }
        }

        namespace.check_files()?;
        Ok(namespace)
    }

    fn all_opts(&self) -> Vec<(&str, &Opt)> {
        self.groups
            .values()
            .flat_map(|entry| {
                entry
                    .opts
                    .values()
                    .map(move |r| (entry.group.name.as_str(), &r.opt))
            })
            .collect()
    }

    fn check_defaults(&self) -> Result<()> {
        for (group, opt) in self.all_opts() {
            if let Err(err) = opt.validate_default() {
                return Err(OsloError::invalid_value(opt.name(), group, err.0));
            }
        }
        Ok(())
    }

    fn check_required_opts(&self) -> Result<()> {
        for (group, opt) in self.all_opts() {
            if opt.is_required() && self.resolve(group, opt, View::Current, &mut Vec::new())?.is_none() {
                return Err(OsloError::RequiredOpt {
                    name: opt.name().to_string(),
                    group: group.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Drop parsed state and the built-in config options.
    pub fn clear(&mut self) {
        self.namespace = None;
        self.mutable_namespace = None;
        self.args.clear();
        self.validate_default_values = false;
        if let Some(entry) = self.groups.get_mut(DEFAULT_GROUP) {
            entry.opts.remove(&CONFIG_FILE_OPT.replace('-', "_"));
            entry.opts.remove(&CONFIG_DIR_OPT.replace('-', "_"));
        }
    }

    /// `clear`, and also drop overrides and defaults.
    pub fn reset(&mut self) {
        self.overrides.clear();
        self.defaults.clear();
        self.clear();
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Resolve the value of an option.
    pub fn get(&self, group: Option<&str>, name: &str) -> Result<Option<Value>> {
        let (group_name, registered) = self.find(group, name)?;
        self.resolve(group_name, &registered.opt, View::Current, &mut Vec::new())
    }

    pub fn get_str(&self, group: Option<&str>, name: &str) -> Result<Option<String>> {
        self.typed(group, name, "string", |v| v.as_str().map(str::to_string))
    }

    pub fn get_int(&self, group: Option<&str>, name: &str) -> Result<Option<i64>> {
        self.typed(group, name, "integer", Value::as_int)
    }

    pub fn get_float(&self, group: Option<&str>, name: &str) -> Result<Option<f64>> {
        self.typed(group, name, "float", Value::as_float)
    }

    pub fn get_bool(&self, group: Option<&str>, name: &str) -> Result<Option<bool>> {
        self.typed(group, name, "boolean", Value::as_bool)
    }

    /// List value; unset lists are empty.
    pub fn get_list(&self, group: Option<&str>, name: &str) -> Result<Vec<Value>> {
        self.typed(group, name, "list", |v| v.as_list().map(<[Value]>::to_vec))
            .map(Option::unwrap_or_default)
    }

    /// List value as strings; unset lists are empty.
    pub fn get_str_list(&self, group: Option<&str>, name: &str) -> Result<Vec<String>> {
        Ok(self
            .get_list(group, name)?
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// Dict value; unset dicts are empty.
    pub fn get_dict(&self, group: Option<&str>, name: &str) -> Result<BTreeMap<String, Value>> {
        self.typed(group, name, "dict", |v| v.as_dict().cloned())
            .map(Option::unwrap_or_default)
    }

    fn typed<T>(
        &self,
        group: Option<&str>,
        name: &str,
        expected: &'static str,
        convert: impl Fn(&Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.get(group, name)? {
            None => Ok(None),
            Some(value) => convert(&value).map(Some).ok_or_else(|| OsloError::WrongType {
                name: name.to_string(),
                group: group.unwrap_or(DEFAULT_GROUP).to_string(),
                expected,
            }),
        }
    }

    fn namespace_for(&self, opt: &Opt) -> Option<&Namespace> {
        if opt.is_mutable() {
            self.mutable_namespace.as_ref().or(self.namespace.as_ref())
        } else {
            self.namespace.as_ref()
        }
    }

    fn resolve(
        &self,
        group: &str,
        opt: &Opt,
        view: View<'_>,
        stack: &mut Vec<OptKey>,
    ) -> Result<Option<Value>> {
        let key: OptKey = (group.to_string(), opt.dest_name().to_string());
        if stack.contains(&key) {
            return Err(OsloError::TemplateSubstitution(format!(
                "circular reference involving {}.{}",
                group,
                opt.dest_name()
            )));
        }
        stack.push(key.clone());
        let result = self.resolve_inner(group, opt, &key, view, stack);
        stack.pop();
        result
    }

    fn resolve_inner(
        &self,
        group: &str,
        opt: &Opt,
        key: &OptKey,
        view: View<'_>,
        stack: &mut Vec<OptKey>,
    ) -> Result<Option<Value>> {
        if let Some(value) = self.overrides.get(key) {
            return self.finish_value(group, opt, value.clone(), view, stack).map(Some);
        }

        let namespace = match view {
            View::Current => self.namespace_for(opt),
            View::Fixed(ns) => ns,
        };

        if let Some(ns) = namespace {
            if let Some(raws) = ns.cli_values(key) {
                return self.convert_raw(group, opt, raws, view, stack);
            }
            if let Some(hit) = ns.file_values(group, opt) {
                if let Some((old_group, old_name)) = &hit.deprecated {
                    tracing::warn!(
                        "Option \"{}\" from group \"{}\" is deprecated. Use option \"{}\" from group \"{}\".",
                        old_name,
                        old_group,
                        opt.dest_name(),
                        group
                    );
                }
                return self.convert_raw(group, opt, &hit.values, view, stack);
            }
        }

        let default = self.defaults.get(key).cloned().or_else(|| opt.default().cloned());
        match default {
            Some(value) => self.finish_value(group, opt, value, view, stack).map(Some),
            None => Ok(None),
        }
    }

    /// Substitute references in raw strings, then convert them.
    fn convert_raw(
        &self,
        group: &str,
        opt: &Opt,
        raws: &[String],
        view: View<'_>,
        stack: &mut Vec<OptKey>,
    ) -> Result<Option<Value>> {
        let substituted = raws
            .iter()
            .map(|raw| self.substitute(group, raw, view, stack))
            .collect::<Result<Vec<_>>>()?;
        opt.parse_raw(&substituted)
            .map_err(|err| OsloError::invalid_value(opt.name(), group, err.0))
    }

    /// Substitute references in a programmatic value; strings are then
    /// converted by the option type.
    fn finish_value(
        &self,
        group: &str,
        opt: &Opt,
        value: Value,
        view: View<'_>,
        stack: &mut Vec<OptKey>,
    ) -> Result<Value> {
        match value {
            Value::Str(raw) => {
                let text = self.substitute(group, &raw, view, stack)?;
                opt.validate(&Value::Str(text))
                    .map_err(|err| OsloError::invalid_value(opt.name(), group, err.0))
            }
            Value::List(items) => {
                let items = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Str(raw) => {
                            self.substitute(group, &raw, view, stack).map(Value::Str)
                        }
                        other => Ok(other),
                    })
                    .collect::<Result<Vec<_>>>()?;
                opt.validate(&Value::List(items))
                    .map_err(|err| OsloError::invalid_value(opt.name(), group, err.0))
            }
            other => Ok(other),
        }
    }

    fn substitute(
        &self,
        group: &str,
        text: &str,
        view: View<'_>,
        stack: &mut Vec<OptKey>,
    ) -> Result<String> {
        if !template::has_references(text) {
            return Ok(text.to_string());
        }
        template::substitute(text, |reference| {
            let target = match reference.split_once('.') {
                Some((ref_group, ref_name)) => self.find(Some(ref_group), ref_name),
                None => self
                    .find(Some(group), reference)
                    .or_else(|_| self.find(None, reference)),
            };
            let (target_group, registered) = target.map_err(|_| {
                OsloError::TemplateSubstitution(format!("unknown option reference ${}", reference))
            })?;
            let value = self.resolve(target_group, &registered.opt, view, stack)?;
            Ok(value.map(|v| v.to_string()).unwrap_or_default())
        })
    }

    // -------------------------------------------------------------------------
    // Overrides and defaults
    // -------------------------------------------------------------------------

    fn checked_value(&self, group: Option<&str>, name: &str, value: Value) -> Result<(OptKey, Value)> {
        let (group_name, registered) = self.find(group, name)?;
        let key = (group_name.to_string(), registered.opt.dest_name().to_string());
        let is_template = matches!(&value, Value::Str(text) if template::has_references(text));
        let stored = if is_template {
            value
        } else {
            registered
                .opt
                .validate(&value)
                .map_err(|err| OsloError::invalid_value(name, group_name, err.0))?
        };
        Ok((key, stored))
    }

    /// Force a value, ignoring every other source.
    pub fn set_override(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        group: Option<&str>,
    ) -> Result<()> {
        let (key, value) = self.checked_value(group, name, value.into())?;
        self.overrides.insert(key, value);
        Ok(())
    }

    pub fn clear_override(&mut self, name: &str, group: Option<&str>) -> Result<()> {
        let (group_name, registered) = self.find(group, name)?;
        let key = (group_name.to_string(), registered.opt.dest_name().to_string());
        self.overrides.remove(&key);
        Ok(())
    }

    /// Replace the declared default.
    pub fn set_default(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        group: Option<&str>,
    ) -> Result<()> {
        let (key, value) = self.checked_value(group, name, value.into())?;
        self.defaults.insert(key, value);
        Ok(())
    }

    pub fn clear_default(&mut self, name: &str, group: Option<&str>) -> Result<()> {
        let (group_name, registered) = self.find(group, name)?;
        let key = (group_name.to_string(), registered.opt.dest_name().to_string());
        self.defaults.remove(&key);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    /// Config files that were actually read, in order.
    #[must_use]
    pub fn config_files(&self) -> Vec<PathBuf> {
        self.namespace
            .as_ref()
            .map(Namespace::file_paths)
            .unwrap_or_default()
    }

    /// Config directories in effect.
    pub fn config_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.is_parsed() {
            return Ok(Vec::new());
        }
        Ok(self
            .get_str_list(None, CONFIG_DIR_OPT)?
            .into_iter()
            .map(sources::fixpath)
            .collect())
    }

    /// Every section name found in the parsed files.
    #[must_use]
    pub fn list_all_sections(&self) -> Vec<String> {
        self.namespace
            .as_ref()
            .map(|ns| ns.sections().into_iter().collect())
            .unwrap_or_default()
    }

    /// All parsed files folded into one document.
    #[must_use]
    pub fn merged_document(&self) -> IniDocument {
        self.namespace
            .as_ref()
            .map(Namespace::merged)
            .unwrap_or_default()
    }

    /// Locate a file next to the configuration.
    ///
    /// Searches the config directories, the directories of the config
    /// files (last file first), then the standard search directories.
    pub fn find_file(&self, name: &str) -> Result<Option<PathBuf>> {
        let mut dirs = self.config_dirs()?;
        dirs.extend(
            self.config_files()
                .iter()
                .rev()
                .filter_map(|file| file.parent().map(PathBuf::from)),
        );
        dirs.extend(sources::config_search_dirs(self.project.as_deref()));
        Ok(sources::search_dirs(&dirs, name, "").map(sources::fixpath))
    }

    // -------------------------------------------------------------------------
    // Reloading
    // -------------------------------------------------------------------------

    /// Re-read the config files. On failure the previous values stay and
    /// `false` is returned.
    pub fn reload_config_files(&mut self) -> bool {
        let Some(current) = self.namespace.take() else {
            return false;
        };
        let fresh = match self.read_sources(current.cli().clone()) {
            Ok(fresh) => fresh,
            Err(err) => {
                tracing::error!(error = %err, "Failed to reload config files");
                self.namespace = Some(current);
                return false;
            }
        };

        self.namespace = Some(fresh);
        if let Err(err) = self.check_required_opts() {
            tracing::error!(error = %err, "Failed to reload config files");
            self.namespace = Some(current);
            return false;
        }
        self.mutable_namespace = None;
        true
    }

    /// Re-read the config files and apply changes to mutable options.
    ///
    /// Changes to immutable options are logged and ignored. Registered
    /// hooks receive the list of changed options.
    pub fn mutate_config_files(&mut self) -> Result<Vec<MutatedOpt>> {
        let cli = match &self.namespace {
            Some(ns) => ns.cli().clone(),
            None => {
                return Err(OsloError::NotParsed {
                    reason: "parse before mutating config files".to_string(),
                });
            }
        };
        let fresh = self.read_sources(cli)?;

        let mut changes = Vec::new();
        {
            let old_ns = self.mutable_namespace.as_ref().or(self.namespace.as_ref());
            for (group, opt) in self.all_opts() {
                let old = self.resolve(group, opt, View::Fixed(old_ns), &mut Vec::new())?;
                let new = self.resolve(group, opt, View::Fixed(Some(&fresh)), &mut Vec::new())?;
                if old == new {
                    continue;
                }
                if opt.is_mutable() {
                    tracing::info!(
                        "Option {}.{} changed from [{}] to [{}]",
                        group,
                        opt.dest_name(),
                        opt.display_value(old.as_ref()),
                        opt.display_value(new.as_ref())
                    );
                    changes.push(MutatedOpt {
                        group: group.to_string(),
                        name: opt.dest_name().to_string(),
                        old,
                        new,
                    });
                } else {
                    tracing::warn!(
                        "Ignoring change to immutable option {}.{}",
                        group,
                        opt.dest_name()
                    );
                }
            }
        }

        self.mutable_namespace = Some(fresh);
        for hook in &self.mutate_hooks {
            hook(self, &changes);
        }
        Ok(changes)
    }

    /// Run `hook` after every `mutate_config_files`.
    pub fn register_mutate_hook<F>(&mut self, hook: F)
    where
        F: Fn(&ConfigOpts, &[MutatedOpt]) + Send + Sync + 'static,
    {
        self.mutate_hooks.push(Box::new(hook));
    }

    // -------------------------------------------------------------------------
    // Help and logging
    // -------------------------------------------------------------------------

    fn command(&self) -> clap::Command {
        let mut settings = self.settings.clone();
        if settings.prog.is_empty() {
            settings.prog = sources::default_prog();
        }
        cli::build_command(&settings, &self.cli_opts())
    }

    /// Rendered `--help` text for the registered command line options.
    #[must_use]
    pub fn help_text(&self) -> String {
        self.command().render_help().to_string()
    }

    /// Rendered usage line.
    #[must_use]
    pub fn usage_text(&self) -> String {
        self.command().render_usage().to_string()
    }

    pub fn print_help(&self, out: &mut impl std::io::Write) -> std::io::Result<()> {
        out.write_all(self.help_text().as_bytes())
    }

    pub fn print_usage(&self, out: &mut impl std::io::Write) -> std::io::Result<()> {
        writeln!(out, "{}", self.usage_text())
    }

    /// Log every option value at `level`, masking secrets.
    pub fn log_opt_values(&self, level: Level) {
        emit(level, &"*".repeat(80));
        emit(level, "Configuration options gathered from:");
        emit(level, &format!("command line args: {:?}", self.args));
        let files: Vec<String> = self
            .config_files()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        emit(level, &format!("config files: {:?}", files));
        emit(level, &"=".repeat(80));

        let default = self.groups.get(DEFAULT_GROUP).into_iter();
        let others = self
            .groups
            .iter()
            .filter(|(name, _)| name.as_str() != DEFAULT_GROUP)
            .map(|(_, entry)| entry);
        for entry in default.chain(others) {
            let group = entry.group.name.as_str();
            for registered in entry.opts.values() {
                let opt = &registered.opt;
                let label = if group == DEFAULT_GROUP {
                    opt.dest_name().to_string()
                } else {
                    format!("{}.{}", group, opt.dest_name())
                };
                let shown = match self.resolve(group, opt, View::Current, &mut Vec::new()) {
                    Ok(value) => opt.display_value(value.as_ref()),
                    Err(err) => format!("<error: {}>", err),
                };
                emit(level, &format!("{:<30} = {}", label, shown));
            }
        }
        emit(level, &"*".repeat(80));
    }
}

fn emit(level: Level, message: &str) {
    if level == Level::ERROR {
        tracing::error!("{}", message);
    } else if level == Level::WARN {
        tracing::warn!("{}", message);
    } else if level == Level::INFO {
        tracing::info!("{}", message);
    } else if level == Level::DEBUG {
        tracing::debug!("{}", message);
    } else {
        tracing::trace!("{}", message);
    }
}

// =============================================================================
// TESTS
// =============================================================================
