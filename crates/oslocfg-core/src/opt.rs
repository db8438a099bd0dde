//! # Opt Module
//!
//! Option and option group definitions.
//!
//! An [`Opt`] only describes an option: its name, type, default and the
//! metadata used for `--help` output and sample files. Values live in
//! [`crate::ConfigOpts`].

use crate::types::{FloatType, IntegerType, IpVersion, OptType, ValueError};
use crate::Value;

/// Name of the implicit top-level group.
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Mask printed in place of secret values.
pub const SECRET_MASK: &str = "****";

// =============================================================================
// DEPRECATED NAMES
// =============================================================================

/// A former name and/or group an option used to be known by.
///
/// `None` fields default to the option's current name or group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecatedOpt {
    pub name: Option<String>,
    pub group: Option<String>,
}

impl DeprecatedOpt {
    /// Old name in the same group.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            group: None,
        }
    }

    /// Same name, old group.
    #[must_use]
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            name: None,
            group: Some(group.into()),
        }
    }

    /// Old name in an old group.
    #[must_use]
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            group: Some(group.into()),
        }
    }
}

// =============================================================================
// OPTION
// =============================================================================

/// A configuration option definition.
#[derive(Debug, Clone)]
pub struct Opt {
    name: String,
    dest: String,
    short: Option<char>,
    kind: OptType,
    multi: bool,
    default: Option<Value>,
    sample_default: Option<String>,
    help: Option<String>,
    required: bool,
    secret: bool,
    positional: bool,
    metavar: Option<String>,
    deprecated_opts: Vec<DeprecatedOpt>,
    deprecated_for_removal: bool,
    deprecated_reason: Option<String>,
    mutable: bool,
}

impl Opt {
    /// Create an option of the given type.
    ///
    /// `dest` is derived from `name` with dashes replaced by underscores.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: OptType) -> Self {
        let name = name.into();
        Self {
            dest: name.replace('-', "_"),
            name,
            short: None,
            kind,
            multi: false,
            default: None,
            sample_default: None,
            help: None,
            required: false,
            secret: false,
            positional: false,
            metavar: None,
            deprecated_opts: Vec::new(),
            deprecated_for_removal: false,
            deprecated_reason: None,
            mutable: false,
        }
    }

    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, OptType::string())
    }

    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, OptType::Integer(IntegerType::default()))
    }

    /// Integer with inclusive bounds.
    #[must_use]
    pub fn integer_range(name: impl Into<String>, min: Option<i64>, max: Option<i64>) -> Self {
        Self::new(
            name,
            OptType::Integer(IntegerType {
                min,
                max,
                choices: Vec::new(),
            }),
        )
    }

    #[must_use]
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, OptType::Float(FloatType::default()))
    }

    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, OptType::Boolean)
    }

    #[must_use]
    pub fn port(name: impl Into<String>) -> Self {
        Self::new(name, OptType::Port(IntegerType::port()))
    }

    #[must_use]
    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, OptType::list())
    }

    #[must_use]
    pub fn dict(name: impl Into<String>) -> Self {
        Self::new(name, OptType::dict())
    }

    #[must_use]
    pub fn ip_address(name: impl Into<String>, version: Option<IpVersion>) -> Self {
        Self::new(name, OptType::IpAddress(version))
    }

    #[must_use]
    pub fn hostname(name: impl Into<String>) -> Self {
        Self::new(name, OptType::Hostname)
    }

    /// A string option that may be given several times; the value is a list.
    #[must_use]
    pub fn multi_string(name: impl Into<String>) -> Self {
        Self::new(name, OptType::string()).multi(true)
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Text shown in sample files instead of the real default.
    #[must_use]
    pub fn sample_default(mut self, text: impl Into<String>) -> Self {
        self.sample_default = Some(text.into());
        self
    }

    #[must_use]
    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    #[must_use]
    pub fn short(mut self, flag: char) -> Self {
        self.short = Some(flag);
        self
    }

    #[must_use]
    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = dest.into();
        self
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn secret(mut self, secret: bool) -> Self {
        self.secret = secret;
        self
    }

    #[must_use]
    pub fn positional(mut self, positional: bool) -> Self {
        self.positional = positional;
        self
    }

    #[must_use]
    pub fn metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar = Some(metavar.into());
        self
    }

    #[must_use]
    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }

    #[must_use]
    pub fn mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    #[must_use]
    pub fn deprecated(mut self, old: DeprecatedOpt) -> Self {
        self.deprecated_opts.push(old);
        self
    }

    /// Mark the option for removal, with an optional reason.
    #[must_use]
    pub fn deprecated_for_removal(mut self, reason: Option<&str>) -> Self {
        self.deprecated_for_removal = true;
        self.deprecated_reason = reason.map(str::to_string);
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dest_name(&self) -> &str {
        &self.dest
    }

    pub fn short_flag(&self) -> Option<char> {
        self.short
    }

    pub fn kind(&self) -> &OptType {
        &self.kind
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn sample_default_text(&self) -> Option<&str> {
        self.sample_default.as_deref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    pub fn is_positional(&self) -> bool {
        self.positional
    }

    pub fn metavar_text(&self) -> Option<&str> {
        self.metavar.as_deref()
    }

    pub fn deprecated_opts(&self) -> &[DeprecatedOpt] {
        &self.deprecated_opts
    }

    pub fn is_deprecated_for_removal(&self) -> bool {
        self.deprecated_for_removal
    }

    pub fn deprecated_reason(&self) -> Option<&str> {
        self.deprecated_reason.as_deref()
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Replace the default; used by sample generation hooks.
    pub fn set_default(&mut self, value: Option<Value>) {
        self.default = value;
    }

    // -------------------------------------------------------------------------
    // Conversion
    // -------------------------------------------------------------------------

    /// Convert one raw string with the option type.
    pub fn parse_value(&self, raw: &str) -> Result<Value, ValueError> {
        self.kind.parse(raw)
    }

    /// Convert the raw occurrences of this option into a value.
    ///
    /// Multi options convert every occurrence into a list; single options
    /// use the last one.
    pub fn parse_raw(&self, raws: &[String]) -> Result<Option<Value>, ValueError> {
        if self.multi {
            return raws
                .iter()
                .map(|raw| self.parse_value(raw))
                .collect::<Result<Vec<_>, _>>()
                .map(|items| Some(Value::List(items)));
        }
        match raws.last() {
            Some(raw) => self.parse_value(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Check a programmatic value against the option type.
    pub fn validate(&self, value: &Value) -> Result<Value, ValueError> {
        if self.multi {
            return match value {
                Value::List(items) => items
                    .iter()
                    .map(|item| self.kind.validate(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List),
                single => self.kind.validate(single).map(|v| Value::List(vec![v])),
            };
        }
        self.kind.validate(value)
    }

    /// Check the declared default against the option type.
    pub fn validate_default(&self) -> Result<(), ValueError> {
        match &self.default {
            Some(value) => self.validate(value).map(|_| ()),
            None => Ok(()),
        }
    }

    /// Render a value for logs, masking secrets.
    #[must_use]
    pub fn display_value(&self, value: Option<&Value>) -> String {
        match value {
            _ if self.secret => SECRET_MASK.to_string(),
            Some(Value::Str(s)) => s.clone(),
            Some(Value::List(items)) if self.multi => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Some(other) => other.to_string(),
            None => "None".to_string(),
        }
    }

    /// Two definitions describe the same option.
    ///
    /// Registering an equivalent option twice is allowed.
    #[must_use]
    pub fn equivalent(&self, other: &Opt) -> bool {
        self.name == other.name
            && self.dest == other.dest
            && self.short == other.short
            && self.kind == other.kind
            && self.multi == other.multi
            && self.default == other.default
            && self.sample_default == other.sample_default
            && self.help == other.help
            && self.required == other.required
            && self.secret == other.secret
            && self.positional == other.positional
            && self.metavar == other.metavar
            && self.deprecated_opts == other.deprecated_opts
            && self.deprecated_for_removal == other.deprecated_for_removal
            && self.deprecated_reason == other.deprecated_reason
            && self.mutable == other.mutable
    }
}

// =============================================================================
// OPTION GROUP
// =============================================================================

/// A named section of options, `[name]` in config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptGroup {
    pub name: String,
    pub title: Option<String>,
    pub help: Option<String>,
}

impl OptGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            help: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Whether this is the implicit `DEFAULT` group.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_GROUP
    }
}

// =============================================================================
// TESTS
// =============================================================================
