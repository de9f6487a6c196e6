use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_HANDLE_LEN: usize = 3;
pub const MAX_HANDLE_LEN: usize = 100;

/// Substrings that mark the first line as a header row.
const HEADER_HINTS: &[&str] = &["linkedin", "username", "profile", "name", "url"];

static PROFILE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[a-z0-9-]+\.)+[a-z]{2,}/(?:in|pub)/([^/?#\s]+)")
        .expect("profile URL regex is valid")
});

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?$").expect("handle regex is valid")
});

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("identifier is empty")]
    Empty,

    #[error("'{handle}' must be between {MIN_HANDLE_LEN} and {MAX_HANDLE_LEN} characters")]
    Length { handle: String },

    #[error("'{handle}' may only contain letters, digits and inner hyphens")]
    Malformed { handle: String },
}

/// A rejected CSV row. `line` is 1-based and counts blank lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedIdentifiers {
    /// Normalized handles, first-seen order, no duplicates.
    pub identifiers: Vec<String>,
    pub errors: Vec<RowError>,
    pub duplicates: usize,
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("the file has no non-blank lines")]
    EmptyInput,

    #[error("no valid profile identifiers found ({} rejected)", errors.len())]
    NoValidEntries { errors: Vec<RowError> },
}

/// Reduces a profile URL or bare handle to a lowercase handle and validates it.
pub fn normalize_identifier(raw: &str) -> Result<String, ValidationError> {
    let candidate = strip_quotes(raw);

    let handle = match PROFILE_URL_RE.captures(candidate) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => candidate.strip_prefix('@').unwrap_or(candidate),
    };

    if handle.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !(MIN_HANDLE_LEN..=MAX_HANDLE_LEN).contains(&handle.len()) {
        return Err(ValidationError::Length {
            handle: handle.to_string(),
        });
    }
    if !HANDLE_RE.is_match(handle) {
        return Err(ValidationError::Malformed {
            handle: handle.to_string(),
        });
    }
    Ok(handle.to_ascii_lowercase())
}

/// Parses an uploaded CSV into profile handles.
///
/// Only the first column is read. Rows that fail validation are reported in
/// `errors` and never abort the parse.
pub fn parse(contents: &str) -> Result<ParsedIdentifiers, CsvError> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .peekable();

    match lines.peek() {
        None => return Err(CsvError::EmptyInput),
        Some((_, first)) if is_header(first) => {
            lines.next();
        }
        Some(_) => {}
    }

    collect(lines.map(|(line_no, line)| (line_no, first_field(line))))
}

/// Validates identifiers submitted directly (no header, one per entry).
/// `line` in row errors is the 1-based position in `items`.
pub fn parse_list<S: AsRef<str>>(items: &[S]) -> Result<ParsedIdentifiers, CsvError> {
    let entries: Vec<(usize, &str)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (i + 1, item.as_ref().trim()))
        .filter(|(_, item)| !item.is_empty())
        .collect();
    if entries.is_empty() {
        return Err(CsvError::EmptyInput);
    }
    collect(entries)
}

fn collect<'a>(
    candidates: impl IntoIterator<Item = (usize, &'a str)>,
) -> Result<ParsedIdentifiers, CsvError> {
    let mut seen = HashSet::new();
    let mut parsed = ParsedIdentifiers {
        identifiers: Vec::new(),
        errors: Vec::new(),
        duplicates: 0,
    };

    for (line_no, field) in candidates {
        match normalize_identifier(field) {
            Ok(handle) => {
                if seen.insert(handle.clone()) {
                    parsed.identifiers.push(handle);
                } else {
                    parsed.duplicates += 1;
                }
            }
            Err(err) => parsed.errors.push(RowError {
                line: line_no,
                identifier: strip_quotes(field).to_string(),
                reason: err.to_string(),
            }),
        }
    }

    if parsed.identifiers.is_empty() {
        return Err(CsvError::NoValidEntries {
            errors: parsed.errors,
        });
    }
    Ok(parsed)
}

// A URL row mentions "linkedin" too, so it only counts as a header when it
// carries no profile URL.
fn is_header(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    HEADER_HINTS.iter().any(|hint| lower.contains(hint)) && !PROFILE_URL_RE.is_match(line)
}

fn first_field(line: &str) -> &str {
    line.split([',', ';']).next().unwrap_or(line)
}

fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headerless_mixed_rows() {
        let csv = "https://linkedin.com/in/john-doe\njane-smith\nbad username!\n";
        let parsed = parse(csv).unwrap();
        assert_eq!(parsed.identifiers, vec!["john-doe", "jane-smith"]);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].line, 3);
        assert_eq!(parsed.errors[0].identifier, "bad username!");
    }

    #[test]
    fn test_header_row_is_skipped() {
        let csv = "LinkedIn Profile,Notes\r\njohn-doe,met at ETHDenver\r\n";
        let parsed = parse(csv).unwrap();
        assert_eq!(parsed.identifiers, vec!["john-doe"]);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let csv = "alice-w\n\nbob-k\nhttps://www.linkedin.com/in/alice-w/\n@Bob-K\ncarol-m\n";
        let parsed = parse(csv).unwrap();
        assert_eq!(parsed.identifiers, vec!["alice-w", "bob-k", "carol-m"]);
        assert_eq!(parsed.duplicates, 2);
    }

    #[test]
    fn test_quotes_and_semicolons() {
        let csv = "\"jane-smith\";Acme\n'john-doe',x\n";
        let parsed = parse(csv).unwrap();
        assert_eq!(parsed.identifiers, vec!["jane-smith", "john-doe"]);
    }

    #[test]
    fn test_url_and_bare_handle_are_equivalent() {
        let bare = normalize_identifier("john-doe").unwrap();
        for raw in [
            "https://linkedin.com/in/john-doe",
            "https://www.linkedin.com/in/john-doe/",
            "linkedin.com/in/john-doe?trk=public",
            "http://uk.linkedin.com/pub/john-doe#about",
            "@john-doe",
            "  \"john-doe\"  ",
        ] {
            assert_eq!(normalize_identifier(raw).unwrap(), bare, "{raw}");
        }
    }

    #[test]
    fn test_invalid_handles() {
        assert_eq!(normalize_identifier("  "), Err(ValidationError::Empty));
        assert!(matches!(
            normalize_identifier("ab"),
            Err(ValidationError::Length { .. })
        ));
        assert!(matches!(
            normalize_identifier(&"a".repeat(101)),
            Err(ValidationError::Length { .. })
        ));
        assert!(matches!(
            normalize_identifier("-john"),
            Err(ValidationError::Malformed { .. })
        ));
        assert!(matches!(
            normalize_identifier("john_doe"),
            Err(ValidationError::Malformed { .. })
        ));
    }

    #[test]
    fn test_empty_and_all_invalid_inputs() {
        assert!(matches!(parse("\n  \r\n"), Err(CsvError::EmptyInput)));
        assert!(matches!(parse(""), Err(CsvError::EmptyInput)));

        match parse("username\nno way\n-x-\n") {
            Err(CsvError::NoValidEntries { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected NoValidEntries, got {other:?}"),
        }
    }

    #[test]
    fn test_direct_list_has_no_header() {
        let parsed = parse_list(&["linkedin-fan", "", "https://linkedin.com/in/jane-smith", "x"]).unwrap();
        assert_eq!(parsed.identifiers, vec!["linkedin-fan", "jane-smith"]);
        assert_eq!(parsed.errors[0].line, 4);
        assert!(matches!(parse_list::<&str>(&[]), Err(CsvError::EmptyInput)));
    }

    #[test]
    fn test_byte_order_mark_is_ignored() {
        let parsed = parse("\u{feff}LinkedIn Profile\njane-smith\n").unwrap();
        assert_eq!(parsed.identifiers, vec!["jane-smith"]);
    }
}
