//! Sample file rendering of groups and options.

use crate::opt::{DEFAULT_GROUP, Opt};
use crate::Value;
use std::io::{self, Write};

/// Type name printed for options that accumulate values.
pub const MULTI_TYPE_NAME: &str = "multi valued";

/// Wrap one line of text with `# ` prefixes, never splitting words.
///
/// Width counts characters. Blank input yields an empty vector.
#[must_use]
pub fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for word in line.split_whitespace() {
        let word_width = word.chars().count();
        if current.is_empty() {
            current = format!("# {}", word);
            current_width = 2 + word_width;
        } else if current_width + 1 + word_width <= width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(std::mem::take(&mut current));
            current = format!("# {}", word);
            current_width = 2 + word_width;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Default values of an option as they appear after `#dest =`.
#[must_use]
pub fn format_defaults(opt: &Opt) -> Vec<String> {
    let defaults = if opt.is_multi() {
        match (opt.sample_default_text(), opt.default()) {
            (Some(sample), _) => vec![sample.to_string()],
            (None, Some(Value::List(items))) if !items.is_empty() => {
                items.iter().map(ToString::to_string).collect()
            }
            (None, Some(value)) if !value.is_empty_collection() => vec![value.to_string()],
            (None, _) => vec![String::new()],
        }
    } else {
        let text = match (opt.sample_default_text(), opt.default()) {
            (Some(sample), _) => sample.to_string(),
            (None, None) => "<None>".to_string(),
            (None, Some(value)) => value.to_string(),
        };
        vec![text]
    };

    defaults
        .into_iter()
        .map(|text| {
            if text.trim() != text {
                format!("\"{}\"", text)
            } else {
                text
            }
        })
        .collect()
}

/// Writes option descriptions to a sample file.
#[derive(Debug)]
pub struct OptFormatter<W: Write> {
    out: W,
    wrap_width: usize,
}

impl<W: Write> OptFormatter<W> {
    /// `wrap_width` of 0 disables wrapping.
    pub fn new(out: W, wrap_width: usize) -> Self {
        Self { out, wrap_width }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Help text as commented lines.
    #[must_use]
    pub fn format_help(&self, help: &str) -> Vec<String> {
        if self.wrap_width == 0 {
            return vec![format!("# {}", help)];
        }
        help.lines()
            .flat_map(|line| {
                let wrapped = wrap(line, self.wrap_width);
                if wrapped.is_empty() {
                    vec!["#".to_string()]
                } else {
                    wrapped
                }
            })
            .collect()
    }

    /// Write a `[group]` header and its help.
    pub fn format_group(&mut self, name: &str, help: Option<&str>) -> io::Result<()> {
        writeln!(self.out, "[{}]", name)?;
        if let Some(help) = help {
            for line in self.format_help(help) {
                writeln!(self.out, "{}", line)?;
            }
        }
        Ok(())
    }

    /// Write the commented description and defaults of one option.
    pub fn format(&mut self, opt: &Opt) -> io::Result<()> {
        let type_name = if opt.is_multi() {
            MULTI_TYPE_NAME
        } else {
            opt.kind().type_name()
        };
        let help = match opt.help_text() {
            Some(help) => format!("{} ({})", help, type_name),
            None => {
                tracing::warn!("\"{}\" is missing a help string", opt.dest_name());
                format!("({})", type_name)
            }
        };

        let mut lines = self.format_help(&help);
        if let Some(min) = opt.kind().min_display() {
            lines.push(format!("# Minimum value: {}", min));
        }
        if let Some(max) = opt.kind().max_display() {
            lines.push(format!("# Maximum value: {}", max));
        }
        let choices = opt.kind().choices_display();
        if !choices.is_empty() {
            let shown: Vec<String> = choices
                .into_iter()
                .map(|c| if c.is_empty() { "''".to_string() } else { c })
                .collect();
            lines.push(format!("# Allowed values: {}", shown.join(", ")));
        }
        if opt.is_mutable() {
            lines.push("# Note: This option can be changed without restarting.".to_string());
        }
        for old in opt.deprecated_opts() {
            lines.push(format!(
                "# Deprecated group/name - [{}]/{}",
                old.group.as_deref().unwrap_or(DEFAULT_GROUP),
                old.name.as_deref().unwrap_or(opt.dest_name())
            ));
        }
        if opt.is_deprecated_for_removal() {
            lines.push("# This option is deprecated for removal.".to_string());
            lines.push("# Its value may be silently ignored in the future.".to_string());
            if let Some(reason) = opt.deprecated_reason() {
                lines.extend(self.format_help(&format!("Reason: {}", reason)));
            }
        }
        for default in format_defaults(opt) {
            if default.is_empty() {
                lines.push(format!("#{} =", opt.dest_name()));
            } else {
                lines.push(format!("#{} = {}", opt.dest_name(), default));
            }
        }

        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        Ok(())
    }

    /// Write raw text.
    pub fn write(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())
    }
}

// =============================================================================
// TESTS
// =============================================================================
