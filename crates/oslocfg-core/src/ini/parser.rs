//! INI config file parser.
//!
//! Grammar, one line at a time (trailing whitespace removed first):
//! - blank line: ends a multi-line value
//! - leading space/tab: continuation of the previous value
//! - `[name]`: section header
//! - `#` or `;`: comment
//! - `key = value` / `key: value`: assignment, the earliest separator wins
//!
//! Repeated keys accumulate; continuation lines are joined with `\n`.

use crate::opt::DEFAULT_GROUP;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A syntax error in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at line {line_number}, {message}: {line:?}")]
pub struct ParseError {
    /// 1-based line number.
    pub line_number: usize,
    pub message: String,
    pub line: String,
}

/// Normalise a section name for lookup: `DEFAULT` stays, the rest is
/// lower-cased.
#[must_use]
pub fn normalize_section(name: &str) -> String {
    if name == DEFAULT_GROUP {
        name.to_string()
    } else {
        name.to_lowercase()
    }
}

/// One `[section]` of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Name as first written in the file.
    pub name: String,
    /// key -> every value assigned to it, in file order.
    pub entries: BTreeMap<String, Vec<String>>,
}

/// A parsed config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IniDocument {
    /// Normalised section name -> section.
    sections: BTreeMap<String, Section>,
}

impl IniDocument {
    /// Parse config file text.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parser = Parser::default();
        for (index, raw) in text.lines().enumerate() {
            parser.feed(index + 1, raw)?;
        }
        parser.finish();
        Ok(parser.document)
    }

    /// Look up a section by name (normalised).
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(&normalize_section(name))
    }

    /// Every value assigned to `key` in `section`.
    #[must_use]
    pub fn values(&self, section: &str, key: &str) -> Option<&[String]> {
        self.section(section)
            .and_then(|s| s.entries.get(key))
            .map(Vec::as_slice)
    }

    /// Section names as written in the file.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.values().map(|s| s.name.as_str())
    }

    /// All sections, ordered by normalised name.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Fold `other` into this document; its values come after ours.
    pub fn merge(&mut self, other: &IniDocument) {
        for (key, section) in &other.sections {
            let target = self
                .sections
                .entry(key.clone())
                .or_insert_with(|| Section {
                    name: section.name.clone(),
                    entries: BTreeMap::new(),
                });
            for (name, values) in &section.entries {
                target
                    .entries
                    .entry(name.clone())
                    .or_default()
                    .extend(values.iter().cloned());
            }
        }
    }
}

// =============================================================================
// PARSER STATE
// =============================================================================

#[derive(Default)]
struct Parser {
    document: IniDocument,
    /// Normalised name of the current section.
    section: Option<String>,
    /// Pending assignment: key and its value lines so far.
    pending: Option<(String, Vec<String>)>,
}

impl Parser {
    fn feed(&mut self, line_number: usize, raw: &str) -> Result<(), ParseError> {
        let line = raw.trim_end();
        let error = |message: &str| ParseError {
            line_number,
            message: message.to_string(),
            line: line.to_string(),
        };

        if line.is_empty() {
            self.flush();
            return Ok(());
        }

        if line.starts_with([' ', '\t']) {
            return match self.pending.as_mut() {
                Some((_, value)) => {
                    value.push(line.trim_start().to_string());
                    Ok(())
                }
                None => Err(error("Unexpected continuation line")),
            };
        }

        self.flush();

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(error("Invalid section (must end with ])"));
            }
            if line.len() <= 2 {
                return Err(error("Empty section name"));
            }
            self.start_section(&line[1..line.len() - 1]);
        } else if line.starts_with(['#', ';']) {
            // comment
        } else {
            let (key, value) = split_key_value(line)
                .ok_or_else(|| error("No ':' or '=' found in assignment"))?;
            if key.is_empty() {
                return Err(error("Key cannot be empty"));
            }
            if self.section.is_none() {
                return Err(error("Section must be started before assignment"));
            }
            self.pending = Some((key, vec![value]));
        }
        Ok(())
    }

    fn start_section(&mut self, name: &str) {
        let key = normalize_section(name);
        self.document
            .sections
            .entry(key.clone())
            .or_insert_with(|| Section {
                name: name.to_string(),
                entries: BTreeMap::new(),
            });
        self.section = Some(key);
    }

    fn flush(&mut self) {
        let Some((key, lines)) = self.pending.take() else {
            return;
        };
        let Some(section) = self
            .section
            .as_ref()
            .and_then(|name| self.document.sections.get_mut(name))
        else {
            return;
        };
        section.entries.entry(key).or_default().push(lines.join("\n"));
    }

    fn finish(&mut self) {
        self.flush();
    }
}

fn split_key_value(line: &str) -> Option<(String, String)> {
    let split_at = match (line.find(':'), line.find('=')) {
        (None, None) => return None,
        (Some(colon), Some(equal)) => colon.min(equal),
        (Some(pos), None) | (None, Some(pos)) => pos,
    };
    let key = line[..split_at].trim().to_string();
    let mut value = line[split_at + 1..].trim();

    if let Some(first) = value.chars().next().filter(|c| *c == '"' || *c == '\'') {
        if value.ends_with(first) {
            value = if value.len() >= 2 {
                &value[1..value.len() - 1]
            } else {
                ""
            };
        }
    }
    Some((key, value.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_sections_and_assignments() {
        let doc = IniDocument::parse(
            "[DEFAULT]\nname = demo\n# comment\n; other\n[Database]\nurl: sqlite://\n",
        )
        .unwrap();
        assert_eq!(doc.values("DEFAULT", "name"), Some(&["demo".to_string()][..]));
        assert_eq!(doc.values("database", "url"), Some(&["sqlite://".to_string()][..]));
        let names: Vec<&str> = doc.section_names().collect();
        assert_eq!(names, vec!["DEFAULT", "Database"]);
    }

    #[test]
    fn earliest_separator_wins() {
        let doc = IniDocument::parse("[s]\na = b:c\nd: e=f\n").unwrap();
        assert_eq!(doc.values("s", "a").unwrap(), ["b:c"]);
        assert_eq!(doc.values("s", "d").unwrap(), ["e=f"]);
    }

    #[test]
    fn repeated_keys_accumulate() {
        let doc = IniDocument::parse("[s]\nopt = 1\nopt = 2\n").unwrap();
        assert_eq!(doc.values("s", "opt").unwrap(), ["1", "2"]);
    }

    #[test]
    fn continuation_lines_join() {
        let doc = IniDocument::parse("[s]\nmotd = hello\n  world\n\tagain\n\nnext = 1\n").unwrap();
        assert_eq!(doc.values("s", "motd").unwrap(), ["hello\nworld\nagain"]);
        assert_eq!(doc.values("s", "next").unwrap(), ["1"]);
    }

    #[test]
    fn surrounding_quotes_stripped() {
        let doc = IniDocument::parse("[s]\na = \" padded \"\nb = 'x\n").unwrap();
        assert_eq!(doc.values("s", "a").unwrap(), [" padded "]);
        assert_eq!(doc.values("s", "b").unwrap(), ["'x"]);
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = IniDocument::parse("[s]\nvalid = 1\nnot an assignment\n").unwrap_err();
        assert_eq!(err.line_number, 3);
        assert_eq!(err.message, "No ':' or '=' found in assignment");

        let err = IniDocument::parse("key = 1\n").unwrap_err();
        assert_eq!(err.message, "Section must be started before assignment");

        let err = IniDocument::parse("  indented\n").unwrap_err();
        assert_eq!(err.message, "Unexpected continuation line");

        let err = IniDocument::parse("[open\n").unwrap_err();
        assert_eq!(err.message, "Invalid section (must end with ])");

        let err = IniDocument::parse("[]\n").unwrap_err();
        assert_eq!(err.message, "Empty section name");

        let err = IniDocument::parse("[s]\n = 1\n").unwrap_err();
        assert_eq!(err.message, "Key cannot be empty");
    }

    #[test]
    fn merge_appends_values() {
        let mut a = IniDocument::parse("[s]\nk = 1\n").unwrap();
        let b = IniDocument::parse("[S]\nk = 2\n[t]\nx = y\n").unwrap();
        a.merge(&b);
        assert_eq!(a.values("s", "k").unwrap(), ["1", "2"]);
        assert_eq!(a.values("t", "x").unwrap(), ["y"]);
    }

    proptest! {
        #[test]
        fn parser_never_panics(text in "(\\PC{0,40}\n){0,10}") {
            let _ = IniDocument::parse(&text);
        }
    }
}
