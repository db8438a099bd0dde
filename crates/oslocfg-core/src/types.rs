//! # Types Module
//!
//! Option value types: conversion of raw strings into [`Value`]s and
//! validation of values supplied programmatically.
//!
//! Every type reports a `type_name` that ends up in generated sample files,
//! e.g. `(integer value)`.

use crate::Value;
use regex::Regex;
use std::collections::BTreeMap;
use std::net::IpAddr;
use thiserror::Error;

/// Lowest value accepted by a port option.
pub const PORT_MIN: i64 = 0;

/// Highest value accepted by a port option.
pub const PORT_MAX: i64 = 65535;

const TRUE_WORDS: [&str; 6] = ["1", "t", "true", "on", "y", "yes"];
const FALSE_WORDS: [&str; 6] = ["0", "f", "false", "off", "n", "no"];

/// A raw value was rejected by its type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValueError(pub String);

impl ValueError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

// =============================================================================
// TYPE PARAMETERS
// =============================================================================

/// Constraints for string options.
#[derive(Debug, Clone, Default)]
pub struct StringType {
    /// Accepted values. Empty means anything goes.
    pub choices: Vec<String>,
    /// Compare `choices` case-insensitively.
    pub ignore_case: bool,
    /// The value must contain a match.
    pub regex: Option<Regex>,
    /// Maximum length in characters.
    pub max_length: Option<usize>,
    /// Strip one pair of surrounding quotes.
    pub quotes: bool,
}

impl PartialEq for StringType {
    fn eq(&self, other: &Self) -> bool {
        self.choices == other.choices
            && self.ignore_case == other.ignore_case
            && self.regex.as_ref().map(Regex::as_str) == other.regex.as_ref().map(Regex::as_str)
            && self.max_length == other.max_length
            && self.quotes == other.quotes
    }
}

/// Constraints for integer and port options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegerType {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub choices: Vec<i64>,
}

impl IntegerType {
    /// Integer constrained to the port range.
    #[must_use]
    pub fn port() -> Self {
        Self {
            min: Some(PORT_MIN),
            max: Some(PORT_MAX),
            choices: Vec::new(),
        }
    }
}

/// Constraints for floating point options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloatType {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// A comma separated list of items.
#[derive(Debug, Clone, PartialEq)]
pub struct ListType {
    pub item: Box<OptType>,
    /// Require the value to be wrapped in `[` and `]`.
    pub bounds: bool,
}

/// A comma separated list of `key:value` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct DictType {
    pub value: Box<OptType>,
    /// Require the value to be wrapped in `{` and `}`.
    pub bounds: bool,
}

/// IP protocol version restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

// =============================================================================
// OPTION TYPE
// =============================================================================

/// The type of an option.
///
/// `Port` bounds may narrow the port range but never widen it.
#[derive(Debug, Clone, PartialEq)]
pub enum OptType {
    String(StringType),
    Integer(IntegerType),
    Port(IntegerType),
    Float(FloatType),
    Boolean,
    List(ListType),
    Dict(DictType),
    IpAddress(Option<IpVersion>),
    Hostname,
}

impl Default for OptType {
    fn default() -> Self {
        Self::String(StringType::default())
    }
}

impl OptType {
    /// Plain string type.
    #[must_use]
    pub fn string() -> Self {
        Self::String(StringType::default())
    }

    /// String type that strips surrounding quotes; the default list item.
    #[must_use]
    pub fn quoted_string() -> Self {
        Self::String(StringType {
            quotes: true,
            ..StringType::default()
        })
    }

    /// List of quoted strings.
    #[must_use]
    pub fn list() -> Self {
        Self::List(ListType {
            item: Box::new(Self::quoted_string()),
            bounds: false,
        })
    }

    /// Dict of quoted strings.
    #[must_use]
    pub fn dict() -> Self {
        Self::Dict(DictType {
            value: Box::new(Self::quoted_string()),
            bounds: false,
        })
    }

    /// Human readable type name, as printed in sample files.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string value",
            Self::Integer(_) => "integer value",
            Self::Port(_) => "port value",
            Self::Float(_) => "floating point value",
            Self::Boolean => "boolean value",
            Self::List(_) => "list value",
            Self::Dict(_) => "dict value",
            Self::IpAddress(_) => "ip address value",
            Self::Hostname => "hostname value",
        }
    }

    /// Minimum value, formatted for display.
    #[must_use]
    pub fn min_display(&self) -> Option<String> {
        match self {
            Self::Integer(t) | Self::Port(t) => t.min.map(|m| m.to_string()),
            Self::Float(t) => t.min.map(|m| format!("{:?}", m)),
            _ => None,
        }
    }

    /// Maximum value, formatted for display.
    #[must_use]
    pub fn max_display(&self) -> Option<String> {
        match self {
            Self::Integer(t) | Self::Port(t) => t.max.map(|m| m.to_string()),
            Self::Float(t) => t.max.map(|m| format!("{:?}", m)),
            _ => None,
        }
    }

    /// Allowed values, formatted for display.
    #[must_use]
    pub fn choices_display(&self) -> Vec<String> {
        match self {
            Self::String(t) => t.choices.clone(),
            Self::Integer(t) | Self::Port(t) => t.choices.iter().map(|c| c.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the raw text of this type is used as-is (no conversion).
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String(_) | Self::IpAddress(_) | Self::Hostname)
    }

    /// Convert a raw string into a value.
    pub fn parse(&self, raw: &str) -> Result<Value, ValueError> {
        match self {
            Self::String(t) => parse_string(t, raw),
            Self::Integer(t) => parse_integer(t, raw),
            Self::Port(t) => {
                let value = parse_integer(t, raw)?;
                if let Value::Int(i) = value {
                    check_int(&IntegerType::port(), i)?;
                }
                Ok(value)
            }
            Self::Float(t) => parse_float(t, raw),
            Self::Boolean => parse_bool(raw).map(Value::Bool),
            Self::List(t) => parse_list(t, raw),
            Self::Dict(t) => parse_dict(t, raw),
            Self::IpAddress(version) => parse_ip(*version, raw),
            Self::Hostname => parse_hostname(raw),
        }
    }

    /// Check a value that did not come from text.
    ///
    /// Strings are converted with [`OptType::parse`]; other values must
    /// already have the right shape and satisfy the constraints.
    pub fn validate(&self, value: &Value) -> Result<Value, ValueError> {
        if let Value::Str(raw) = value {
            return self.parse(raw);
        }
        match (self, value) {
            (Self::Integer(t), Value::Int(i)) => {
                check_int(t, *i)?;
                Ok(Value::Int(*i))
            }
            (Self::Port(t), Value::Int(i)) => {
                check_int(t, *i)?;
                check_int(&IntegerType::port(), *i)?;
                Ok(Value::Int(*i))
            }
            (Self::Float(t), Value::Float(_) | Value::Int(_)) => {
                let f = value.as_float().unwrap_or_default();
                check_float(t, f)?;
                Ok(Value::Float(f))
            }
            (Self::Boolean, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (Self::List(t), Value::List(items)) => items
                .iter()
                .map(|item| t.item.validate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (Self::Dict(t), Value::Dict(map)) => map
                .iter()
                .map(|(k, v)| t.value.validate(v).map(|v| (k.clone(), v)))
                .collect::<Result<BTreeMap<_, _>, ValueError>>()
                .map(Value::Dict),
            _ => Err(ValueError(format!(
                "expected {}, found {} {:?}",
                self.type_name(),
                value.kind(),
                value.to_string()
            ))),
        }
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

fn parse_string(t: &StringType, raw: &str) -> Result<Value, ValueError> {
    let mut value = raw;
    if t.quotes {
        if let Some(first) = value.chars().next().filter(|c| *c == '"' || *c == '\'') {
            if value.len() < 2 || !value.ends_with(first) {
                return Err(ValueError(format!("Non-closed quote: {}", value)));
            }
            value = &value[1..value.len() - 1];
        }
    }

    if let Some(max) = t.max_length {
        if value.chars().count() > max {
            return Err(ValueError(format!(
                "Value '{}' exceeds maximum length {}",
                value, max
            )));
        }
    }

    if let Some(re) = &t.regex {
        if !re.is_match(value) {
            return Err(ValueError(format!(
                "Value {:?} doesn't match regex {:?}",
                value,
                re.as_str()
            )));
        }
    }

    if !t.choices.is_empty() {
        let found = if t.ignore_case {
            let lowered = value.to_lowercase();
            t.choices.iter().any(|c| c.to_lowercase() == lowered)
        } else {
            t.choices.iter().any(|c| c == value)
        };
        if !found {
            return Err(ValueError(format!(
                "Valid values are [{}], but found {:?}",
                t.choices.join(", "),
                value
            )));
        }
    }

    Ok(Value::Str(value.to_string()))
}

fn check_int(t: &IntegerType, i: i64) -> Result<(), ValueError> {
    if let Some(min) = t.min {
        if i < min {
            return Err(ValueError(format!(
                "Should be greater than or equal to {}",
                min
            )));
        }
    }
    if let Some(max) = t.max {
        if i > max {
            return Err(ValueError(format!("Should be less than or equal to {}", max)));
        }
    }
    if !t.choices.is_empty() && !t.choices.contains(&i) {
        let valid: Vec<String> = t.choices.iter().map(|c| c.to_string()).collect();
        return Err(ValueError(format!(
            "Valid values are [{}], but found {}",
            valid.join(", "),
            i
        )));
    }
    Ok(())
}

fn parse_integer(t: &IntegerType, raw: &str) -> Result<Value, ValueError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValueError::new("Empty value is not an integer"));
    }
    let i: i64 = trimmed
        .parse()
        .map_err(|_| ValueError(format!("invalid literal for integer: {:?}", trimmed)))?;
    check_int(t, i)?;
    Ok(Value::Int(i))
}

fn check_float(t: &FloatType, f: f64) -> Result<(), ValueError> {
    if let Some(min) = t.min {
        if f < min {
            return Err(ValueError(format!(
                "Should be greater than or equal to {:?}",
                min
            )));
        }
    }
    if let Some(max) = t.max {
        if f > max {
            return Err(ValueError(format!(
                "Should be less than or equal to {:?}",
                max
            )));
        }
    }
    Ok(())
}

fn parse_float(t: &FloatType, raw: &str) -> Result<Value, ValueError> {
    let trimmed = raw.trim();
    let f: f64 = trimmed
        .parse()
        .map_err(|_| ValueError(format!("could not convert string to float: {:?}", trimmed)))?;
    check_float(t, f)?;
    Ok(Value::Float(f))
}

/// Interpret a boolean word (`yes`, `off`, `1`, ...), case-insensitively.
pub fn parse_bool(raw: &str) -> Result<bool, ValueError> {
    let lowered = raw.trim().to_lowercase();
    if TRUE_WORDS.contains(&lowered.as_str()) {
        Ok(true)
    } else if FALSE_WORDS.contains(&lowered.as_str()) {
        Ok(false)
    } else {
        Err(ValueError(format!("Unexpected boolean value {:?}", raw)))
    }
}

/// Split on `sep`, ignoring separators inside single or double quotes.
///
/// Pieces are trimmed; quotes are left in place for the item type.
fn split_quoted(s: &str, sep: char) -> Result<Vec<String>, ValueError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in s.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                current.push(c);
            }
            None if c == sep => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            None => current.push(c),
        }
    }

    if quote.is_some() {
        return Err(ValueError(format!("Non-closed quote: {}", s)));
    }
    parts.push(current.trim().to_string());
    Ok(parts)
}

fn strip_bounds<'a>(s: &'a str, open: char, close: char) -> Result<&'a str, ValueError> {
    let inner = s
        .strip_prefix(open)
        .ok_or_else(|| ValueError(format!("Value should start with \"{}\"", open)))?;
    inner
        .strip_suffix(close)
        .ok_or_else(|| ValueError(format!("Value should end with \"{}\"", close)))
}

fn parse_list(t: &ListType, raw: &str) -> Result<Value, ValueError> {
    let mut s = raw.trim();
    if t.bounds {
        s = strip_bounds(s, '[', ']')?.trim();
    }
    let s = s.trim_end_matches(',');
    if s.is_empty() {
        return Ok(Value::List(Vec::new()));
    }

    split_quoted(s, ',')?
        .iter()
        .map(|item| t.item.parse(item))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn parse_dict(t: &DictType, raw: &str) -> Result<Value, ValueError> {
    let mut s = raw.trim();
    if t.bounds {
        s = strip_bounds(s, '{', '}')?.trim();
    }
    let mut map = BTreeMap::new();
    if s.is_empty() {
        return Ok(Value::Dict(map));
    }

    for pair in split_quoted(s, ',')? {
        let (key, value) = pair
            .split_once(':')
            .ok_or_else(|| ValueError(format!("Value not in key:value format: {:?}", pair)))?;
        let key = key.trim().to_string();
        if map.contains_key(&key) {
            return Err(ValueError(format!("Duplicate key in dict: {:?}", key)));
        }
        map.insert(key, t.value.parse(value.trim())?);
    }
    Ok(Value::Dict(map))
}

fn parse_ip(version: Option<IpVersion>, raw: &str) -> Result<Value, ValueError> {
    let trimmed = raw.trim();
    let addr: IpAddr = trimmed
        .parse()
        .map_err(|_| ValueError(format!("{} is not IP address", trimmed)))?;
    match (version, addr) {
        (Some(IpVersion::V4), IpAddr::V6(_)) => {
            Err(ValueError(format!("{} is not IPv4 address", trimmed)))
        }
        (Some(IpVersion::V6), IpAddr::V4(_)) => {
            Err(ValueError(format!("{} is not IPv6 address", trimmed)))
        }
        _ => Ok(Value::Str(addr.to_string())),
    }
}

fn valid_label(label: &str) -> bool {
    (1..=63).contains(&label.len())
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn parse_hostname(raw: &str) -> Result<Value, ValueError> {
    if raw.is_empty() {
        return Err(ValueError::new("Cannot have an empty hostname"));
    }
    if raw.len() > 253 {
        return Err(ValueError(format!(
            "hostname is greater than 253 characters: {}",
            raw
        )));
    }
    let value = raw.strip_suffix('.').unwrap_or(raw);
    let labels: Vec<&str> = value.split('.').collect();
    let numeric_tld = labels
        .last()
        .is_some_and(|last| last.chars().all(|c| c.is_ascii_digit()));
    if numeric_tld || !labels.iter().all(|l| valid_label(l)) {
        return Err(ValueError(format!("{} is an invalid hostname", value)));
    }
    Ok(Value::Str(value.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
