//! # CLI Module
//!
//! Builds a `clap::Command` from the registered command line options and
//! reads raw values back out of the matches.
//!
//! Naming follows the config file layout: options of the `DEFAULT` group
//! are `--name`, grouped options are `--group-name`. Booleans also get a
//! negative form (`--noname`, `--group-noname`); the last one given wins.

use crate::conf::namespace::OptKey;
use crate::opt::{DEFAULT_GROUP, Opt};
use crate::types::OptType;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::BTreeMap;

/// Program level settings for the generated command.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommandSettings {
    pub prog: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub usage: Option<String>,
}

/// A command line option together with its group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CliOpt<'a> {
    pub group: &'a str,
    pub opt: &'a Opt,
}

impl CliOpt<'_> {
    fn key(&self) -> OptKey {
        (self.group.to_string(), self.opt.dest_name().to_string())
    }

    fn arg_id(&self) -> String {
        prefixed_id(self.group, self.opt.dest_name())
    }

    fn negated_id(&self) -> String {
        format!("no{}", self.arg_id())
    }

    fn long(&self) -> String {
        prefixed_long(self.group, "", self.opt.name())
    }

    fn negated_long(&self) -> String {
        prefixed_long(self.group, "no", self.opt.name())
    }

    fn value_name(&self) -> String {
        self.opt
            .metavar_text()
            .map(str::to_string)
            .unwrap_or_else(|| self.opt.dest_name().to_uppercase())
    }

    /// Long forms of the deprecated names, excluding the current one.
    fn aliases(&self) -> Vec<String> {
        let current = self.long();
        self.opt
            .deprecated_opts()
            .iter()
            .map(|old| {
                prefixed_long(
                    old.group.as_deref().unwrap_or(self.group),
                    "",
                    old.name.as_deref().unwrap_or(self.opt.name()),
                )
            })
            .filter(|alias| *alias != current)
            .collect()
    }
}

/// Names clap reserves for its own flags.
const HELP_ID: &str = "help";
const HELP_SHORT: char = 'h';
const VERSION_ID: &str = "version";
const VERSION_SHORT: char = 'V';

/// Everything one option claims on the command line.
struct ArgNames {
    ids: Vec<String>,
    longs: Vec<String>,
    short: Option<char>,
}

impl ArgNames {
    fn of(cli: &CliOpt<'_>) -> Self {
        let mut ids = vec![cli.arg_id()];
        let mut longs = Vec::new();
        if !cli.opt.is_positional() {
            longs.push(cli.long());
            longs.extend(cli.aliases());
        }
        if is_flag(cli.opt) {
            ids.push(cli.negated_id());
            longs.push(cli.negated_long());
        }
        Self {
            ids,
            longs,
            short: cli.opt.short_flag(),
        }
    }

    fn reserved(with_version: bool) -> Self {
        let mut names = Self {
            ids: vec![HELP_ID.to_string()],
            longs: vec![HELP_ID.to_string()],
            short: Some(HELP_SHORT),
        };
        if with_version {
            names.ids.push(VERSION_ID.to_string());
            names.longs.push(VERSION_ID.to_string());
        }
        names
    }

    /// The first name both claim, rendered as it appears on the command line.
    fn clash(&self, other: &ArgNames) -> Option<String> {
        if let Some(id) = self.ids.iter().find(|id| other.ids.contains(id)) {
            return Some(id.clone());
        }
        if let Some(long) = self.longs.iter().find(|long| other.longs.contains(long)) {
            return Some(format!("--{}", long));
        }
        match (self.short, other.short) {
            (Some(a), Some(b)) if a == b => Some(format!("-{}", a)),
            _ => None,
        }
    }
}

/// Name `candidate` would share with `existing` options or with clap's own
/// flags.
pub(crate) fn find_clash(
    existing: &[CliOpt<'_>],
    candidate: &CliOpt<'_>,
    with_version: bool,
) -> Option<String> {
    let names = ArgNames::of(candidate);
    if let Some(clash) = names.clash(&ArgNames::reserved(with_version)) {
        return Some(clash);
    }
    if with_version && names.short == Some(VERSION_SHORT) {
        return Some(format!("-{}", VERSION_SHORT));
    }
    existing
        .iter()
        .find_map(|other| names.clash(&ArgNames::of(other)))
}

/// First clash among a full set of options.
pub(crate) fn first_clash(settings: &CommandSettings, opts: &[CliOpt<'_>]) -> Option<String> {
    let with_version = settings.version.is_some();
    opts.iter()
        .enumerate()
        .find_map(|(i, cli)| find_clash(&opts[..i], cli, with_version))
}

fn is_flag(opt: &Opt) -> bool {
    matches!(opt.kind(), OptType::Boolean) && !opt.is_multi()
}

fn prefixed_id(group: &str, dest: &str) -> String {
    if group == DEFAULT_GROUP {
        dest.to_string()
    } else {
        format!("{}_{}", group, dest)
    }
}

fn prefixed_long(group: &str, prefix: &str, name: &str) -> String {
    if group == DEFAULT_GROUP {
        format!("{}{}", prefix, name)
    } else {
        format!("{}-{}{}", group, prefix, name)
    }
}

fn takes_negative_numbers(kind: &OptType) -> bool {
    matches!(kind, OptType::Integer(_) | OptType::Port(_) | OptType::Float(_))
}

fn value_arg(cli: &CliOpt<'_>) -> Arg {
    let opt = cli.opt;
    let mut arg = Arg::new(cli.arg_id()).value_name(cli.value_name());

    if opt.is_positional() {
        arg = arg.required(opt.is_required());
        if opt.is_multi() {
            arg = arg
                .action(ArgAction::Append)
                .num_args(if opt.is_required() { 1_usize.. } else { 0_usize.. });
        }
    } else {
        arg = arg
            .long(cli.long())
            .action(if opt.is_multi() {
                ArgAction::Append
            } else {
                ArgAction::Set
            });
        if let Some(short) = opt.short_flag() {
            arg = arg.short(short);
        }
        for alias in cli.aliases() {
            arg = arg.alias(alias);
        }
    }

    if takes_negative_numbers(opt.kind()) {
        arg = arg.allow_negative_numbers(true);
    }
    if let Some(help) = opt.help_text() {
        arg = arg.help(help.to_string());
    }
    arg
}

fn bool_args(cli: &CliOpt<'_>) -> [Arg; 2] {
    let opt = cli.opt;
    let mut positive = Arg::new(cli.arg_id())
        .long(cli.long())
        .action(ArgAction::SetTrue)
        .overrides_with(cli.negated_id());
    if let Some(short) = opt.short_flag() {
        positive = positive.short(short);
    }
    for alias in cli.aliases() {
        positive = positive.alias(alias);
    }
    if let Some(help) = opt.help_text() {
        positive = positive.help(help.to_string());
    }

    let negative = Arg::new(cli.negated_id())
        .long(cli.negated_long())
        .action(ArgAction::SetTrue)
        .overrides_with(cli.arg_id())
        .help(format!("The inverse of --{}", cli.long()));

    [positive, negative]
}

/// Build the command for the given options.
pub(crate) fn build_command(settings: &CommandSettings, opts: &[CliOpt<'_>]) -> Command {
    let mut command = Command::new(settings.prog.clone()).args_override_self(true);
    if let Some(version) = &settings.version {
        command = command.version(version.clone());
    }
    if let Some(description) = &settings.description {
        command = command.about(description.clone());
    }
    if let Some(usage) = &settings.usage {
        command = command.override_usage(usage.clone());
    }

    for cli in opts {
        if is_flag(cli.opt) {
            command = command.args(bool_args(cli));
        } else {
            command = command.arg(value_arg(cli));
        }
    }
    command
}

/// Raw values given on the command line, keyed by `(group, dest)`.
///
/// Booleans are reported as `"true"` / `"false"`.
pub(crate) fn collect_values(
    matches: &ArgMatches,
    opts: &[CliOpt<'_>],
) -> BTreeMap<OptKey, Vec<String>> {
    let mut values = BTreeMap::new();
    for cli in opts {
        if is_flag(cli.opt) {
            let given = if matches.get_flag(&cli.arg_id()) {
                Some("true")
            } else if matches.get_flag(&cli.negated_id()) {
                Some("false")
            } else {
                None
            };
            if let Some(given) = given {
                values.insert(cli.key(), vec![given.to_string()]);
            }
            continue;
        }

        if let Some(raw) = matches.get_many::<String>(&cli.arg_id()) {
            let raw: Vec<String> = raw.cloned().collect();
            if !raw.is_empty() {
                values.insert(cli.key(), raw);
            }
        }
    }
    values
}

// =============================================================================
// TESTS
// =============================================================================
