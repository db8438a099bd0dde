//! `$name` / `${name}` / `${group.name}` references inside values.
//!
//! `$$` is a literal dollar. A `$` not followed by a valid identifier is
//! left alone.

use crate::Result;

fn is_id_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_id_char(c: char) -> bool {
    c == '_' || c == '.' || c.is_ascii_alphanumeric()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(is_id_start) && chars.all(is_id_char)
}

/// Whether `text` contains anything to substitute.
pub(crate) fn has_references(text: &str) -> bool {
    text.contains('$')
}

/// Replace every reference in `text` using `lookup`.
pub(crate) fn substitute<F>(text: &str, mut lookup: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
            continue;
        }

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let key = &braced[..end];
                if is_identifier(key) {
                    out.push_str(&lookup(key)?);
                    rest = &braced[end + 1..];
                    continue;
                }
            }
            out.push('$');
            rest = after;
            continue;
        }

        let len = match after.chars().next() {
            Some(c) if is_id_start(c) => after
                .char_indices()
                .find(|(_, c)| !is_id_char(*c))
                .map(|(i, _)| i)
                .unwrap_or(after.len()),
            _ => 0,
        };
        if len == 0 {
            out.push('$');
            rest = after;
        } else {
            out.push_str(&lookup(&after[..len])?);
            rest = &after[len..];
        }
    }

    out.push_str(rest);
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::OsloError;

    fn table(key: &str) -> Result<String> {
        match key {
            "state_path" => Ok("/var/lib/demo".to_string()),
            "db.host" => Ok("10.0.0.1".to_string()),
            other => Err(OsloError::TemplateSubstitution(format!("unknown {}", other))),
        }
    }

    #[test]
    fn plain_and_braced_references() {
        assert_eq!(substitute("$state_path/lock", table).unwrap(), "/var/lib/demo/lock");
        assert_eq!(substitute("${state_path}x", table).unwrap(), "/var/lib/demox");
        assert_eq!(substitute("mysql://${db.host}/", table).unwrap(), "mysql://10.0.0.1/");
    }

    #[test]
    fn dollar_escapes_and_literals() {
        assert_eq!(substitute("cost $$5", table).unwrap(), "cost $5");
        assert_eq!(substitute("$5 and $", table).unwrap(), "$5 and $");
        assert_eq!(substitute("${not closed", table).unwrap(), "${not closed");
    }

    #[test]
    fn unknown_reference_fails() {
        assert!(substitute("$missing", table).is_err());
    }

    #[test]
    fn text_without_references_is_unchanged() {
        assert!(!has_references("plain"));
        assert_eq!(substitute("plain", table).unwrap(), "plain");
    }
}
