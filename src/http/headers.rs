//! Header container.
//!
//! Names are stored lower-cased and looked up case-insensitively. Setting a
//! name that is already present folds the new value onto the old one with
//! `", "`; `overwrite` replaces it instead.

use std::collections::btree_map::{self, BTreeMap};

use thiserror::Error;

const CRLF: &[u8] = b"\r\n";

/// Error returned when a header line or field cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The header line has no `:` separating name and value.
    #[error("no colon found in header line")]
    MissingColon,
    /// The field name contains characters outside the token grammar.
    #[error("field name {0:?} contains invalid characters")]
    InvalidName(String),
    /// The field value contains a bare CR or LF.
    #[error("field value for {0:?} contains a line break")]
    InvalidValue(String),
}

/// Case-insensitive mapping from header name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: BTreeMap<String, String>,
}

impl Headers {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a container from lower-case literal names and values that are
    /// known to be valid; duplicates overwrite.
    pub(crate) fn from_trusted<const N: usize>(fields: [(&'static str, String); N]) -> Self {
        debug_assert!(fields
            .iter()
            .all(|(name, value)| is_token(name)
                && !name.bytes().any(|b| b.is_ascii_uppercase())
                && !value.contains(['\r', '\n'])));
        Self {
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
        }
    }

    /// Look up a header, ignoring the case of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    /// Insert a header, folding onto any existing value with `", "`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), HeaderError> {
        let name = validated_name(name)?;
        let value = validated_value(&name, value)?;

        match self.fields.entry(name) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value.to_owned());
            }
            btree_map::Entry::Occupied(mut entry) => {
                let folded = entry.get_mut();
                folded.push_str(", ");
                folded.push_str(value);
            }
        }
        Ok(())
    }

    /// Insert a header, replacing any existing value.
    pub fn overwrite(&mut self, name: &str, value: &str) -> Result<(), HeaderError> {
        let name = validated_name(name)?;
        let value = validated_value(&name, value)?.to_owned();
        self.fields.insert(name, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(lower-cased name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse `Content-Length` as a signed integer.
    ///
    /// Returns `None` when the header is absent and `Some(Err(raw))` when it
    /// is present but not a number.
    pub fn content_length(&self) -> Option<Result<i64, &str>> {
        self.get("content-length")
            .map(|raw| raw.parse::<i64>().map_err(|_| raw))
    }

    /// Consume one `name: value\r\n` line from the front of `data`.
    ///
    /// Returns the number of bytes consumed and whether the line was the bare
    /// CRLF that ends the header section. `(0, false)` means no complete line
    /// is buffered yet. On error nothing is consumed and the container is left
    /// untouched.
    ///
    /// Only the name is held to the token grammar. Value bytes outside UTF-8
    /// (obs-text) are kept, with invalid sequences replaced by U+FFFD.
    pub fn parse_line(&mut self, data: &[u8]) -> Result<(usize, bool), HeaderError> {
        let Some(end) = find_crlf(data) else {
            return Ok((0, false));
        };
        if end == 0 {
            return Ok((CRLF.len(), true));
        }

        let line = data[..end].trim_ascii();
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(HeaderError::MissingColon)?;
        let (name, value) = (&line[..colon], line[colon + 1..].trim_ascii());
        if !is_token(name) {
            return Err(HeaderError::InvalidName(String::from_utf8_lossy(name).into_owned()));
        }

        // token bytes are ASCII
        let name = String::from_utf8_lossy(name);
        self.set(&name, &String::from_utf8_lossy(value))?;
        Ok((end + CRLF.len(), false))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Whether `s` is a non-empty RFC 9110 token.
pub fn is_token(s: impl AsRef<[u8]>) -> bool {
    let s = s.as_ref();
    !s.is_empty() && s.iter().copied().all(is_token_byte)
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
        )
}

/// Capitalize every hyphen-delimited segment: `x-content-sha256` becomes
/// `X-Content-Sha256`.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, segment) in name.split('-').enumerate() {
        if i > 0 {
            out.push('-');
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars.map(|c| c.to_ascii_lowercase()));
        }
    }
    out
}

pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF)
}

fn validated_name(name: &str) -> Result<String, HeaderError> {
    if !is_token(name) {
        return Err(HeaderError::InvalidName(name.to_owned()));
    }
    Ok(name.to_ascii_lowercase())
}

fn validated_value<'v>(name: &str, value: &'v str) -> Result<&'v str, HeaderError> {
    if value.contains(['\r', '\n']) {
        return Err(HeaderError::InvalidValue(name.to_owned()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_header() {
        let mut headers = Headers::new();
        let (n, done) = headers.parse_line(b"Host: localhost:42069\r\n\r\n").unwrap();
        assert_eq!(headers.get("Host"), Some("localhost:42069"));
        assert_eq!(n, 23);
        assert!(!done);
    }

    #[test]
    fn trims_extra_whitespace() {
        let mut headers = Headers::new();
        let (n, done) = headers
            .parse_line(b"Content-Type:   application/json   \r\n\r\n")
            .unwrap();
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(n, 37);
        assert!(!done);
    }

    #[test]
    fn parses_consecutive_lines() {
        let mut headers = Headers::new();
        let data = b"Host: localhost:42069\r\nContent-Type: application/json\r\n";
        let (n, _) = headers.parse_line(data).unwrap();
        let (_, done) = headers.parse_line(&data[n..]).unwrap();
        assert!(!done);
        assert_eq!(headers.get("HOST"), Some("localhost:42069"));
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
    }

    #[test]
    fn bare_crlf_ends_section() {
        let mut headers = Headers::new();
        assert_eq!(headers.parse_line(b"\r\n").unwrap(), (2, true));
        assert!(headers.is_empty());
    }

    #[test]
    fn incomplete_line_needs_more() {
        let mut headers = Headers::new();
        assert_eq!(headers.parse_line(b"Host: local").unwrap(), (0, false));
        assert_eq!(headers.parse_line(b"Host: localhost\r").unwrap(), (0, false));
        assert!(headers.is_empty());
    }

    #[test]
    fn rejects_space_before_colon() {
        let mut headers = Headers::new();
        let data = b"       Host : localhost:42069       \r\n\r\n";
        let first = headers.parse_line(data).unwrap_err();
        assert_eq!(first, HeaderError::InvalidName("Host ".into()));

        // re-feeding the same bytes fails the same way and stores nothing
        let second = headers.parse_line(data).unwrap_err();
        assert_eq!(first, second);
        assert!(headers.is_empty());
    }

    #[test]
    fn rejects_non_token_characters() {
        let mut headers = Headers::new();
        let err = headers.parse_line("H©st: localhost:42069\r\n\r\n".as_bytes()).unwrap_err();
        assert!(matches!(err, HeaderError::InvalidName(_)));
    }

    #[test]
    fn obs_text_value_is_kept() {
        let mut headers = Headers::new();
        let (n, done) = headers.parse_line(b"X-Name: caf\xe9\r\n\r\n").unwrap();
        assert_eq!((n, done), (14, false));
        assert_eq!(headers.get("x-name"), Some("caf\u{fffd}"));

        headers.parse_line("X-Other: café\r\n".as_bytes()).unwrap();
        assert_eq!(headers.get("x-other"), Some("café"));
    }

    #[test]
    fn rejects_missing_colon() {
        let mut headers = Headers::new();
        assert_eq!(
            headers.parse_line(b"NoColonHere\r\n").unwrap_err(),
            HeaderError::MissingColon
        );
    }

    #[test]
    fn folds_duplicate_headers() {
        let mut headers = Headers::new();
        headers.set("Accept", "application/json").unwrap();
        headers.parse_line(b"accept: xml\r\n").unwrap();
        assert_eq!(headers.get("ACCEPT"), Some("application/json, xml"));

        let mut headers = Headers::new();
        headers.set("X-Thing", "a").unwrap();
        headers.set("x-thing", "b").unwrap();
        assert_eq!(headers.get("x-THING"), Some("a, b"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn overwrite_replaces_value() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain").unwrap();
        headers.overwrite("content-type", "text/html").unwrap();
        assert_eq!(headers.get("Content-Type"), Some("text/html"));
    }

    #[test]
    fn set_validates_name_and_value() {
        let mut headers = Headers::new();
        assert!(matches!(
            headers.set("Bad Name", "x"),
            Err(HeaderError::InvalidName(_))
        ));
        assert!(matches!(
            headers.set("X-Injected", "a\r\nEvil: 1"),
            Err(HeaderError::InvalidValue(_))
        ));
        assert!(headers.is_empty());
    }

    #[test]
    fn content_length_variants() {
        let mut headers = Headers::new();
        assert_eq!(headers.content_length(), None);
        headers.set("Content-Length", "13").unwrap();
        assert_eq!(headers.content_length(), Some(Ok(13)));
        headers.overwrite("Content-Length", "lots").unwrap();
        assert_eq!(headers.content_length(), Some(Err("lots")));
    }

    #[test]
    fn title_cases_each_segment() {
        assert_eq!(title_case("content-type"), "Content-Type");
        assert_eq!(title_case("x-content-sha256"), "X-Content-Sha256");
        assert_eq!(title_case("host"), "Host");
    }
}
