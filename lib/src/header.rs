//! Document headers: the leading block of `<!-- key[: value] -->` lines.
//!
//! ```text
//! <!-- title: Getting Started -->
//! <!-- date: 2021-03-14 -->
//! <!-- tags: Tutorial, Beginner -->
//! <!-- blog -->
//!
//! The body starts at the first line that isn't a header line.
//! ```

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::{Kind, Result};
use crate::value::Value;

pub const DATE: &str = "date";
pub const TITLE: &str = "title";
pub const TEMPLATE: &str = "template";
pub const DRAFT: &str = "draft";

/// Parsed header fields, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    fields: Vec<(Arc<str>, Value)>,
}

impl Header {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key`, replacing an earlier declaration in place.
    pub fn insert<K: Into<Arc<str>>, V: Into<Value>>(&mut self, key: K, value: V) {
        let (key, value) = (key.into(), value.into());
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> + '_ {
        self.fields.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `true` for a bare `draft` flag or any `draft` value other than `false`.
    pub fn is_draft(&self) -> bool {
        match self.get(DRAFT) {
            None | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.trim().eq_ignore_ascii_case("false"),
            Some(_) => true,
        }
    }
}

/// Splits document text into its [`Header`] and body.
///
/// Fields named in `list_fields` (the configured taxonomy ids) are split on
/// commas into arrays. A field without a value becomes the flag `true`.
#[derive(Debug, Clone, Default)]
pub struct HeaderParser {
    list_fields: FxHashSet<Arc<str>>,
}

impl HeaderParser {
    pub fn new<I, S>(list_fields: I) -> Self
        where I: IntoIterator<Item = S>, S: Into<Arc<str>>
    {
        HeaderParser { list_fields: list_fields.into_iter().map(Into::into).collect() }
    }

    /// Parses the header of `text`, returning it and the remaining body.
    ///
    /// Blank lines may separate header lines. Scanning stops at the first
    /// other line that isn't a complete one-line `<!-- ... -->` field. The
    /// only error is a comment opened in the header position that is never
    /// closed before the end of `text`.
    pub fn parse<'a>(&self, text: &'a str) -> Result<(Header, &'a str)> {
        let mut header = Header::default();
        let mut body_start = 0;
        let mut cursor = 0;

        while cursor < text.len() {
            let rest = &text[cursor..];
            let (line, advance) = match rest.find('\n') {
                Some(i) => (&rest[..i], i + 1),
                None => (rest, rest.len()),
            };

            let line = line.trim();
            if line.is_empty() {
                cursor += advance;
                continue;
            }

            if !line.starts_with("<!--") {
                break;
            }

            let Some(inner) = line[4..].strip_suffix("-->") else {
                if !rest.contains("-->") {
                    let line_no = text[..cursor].lines().count() + 1;
                    return err!([Kind::MalformedHeader] "header comment is never closed",
                        "line" => line_no,
                        "opened with" => line,
                    );
                }

                break;
            };

            match self.field(inner) {
                Some((key, value)) => header.insert(key, value),
                None => break,
            }

            cursor += advance;
            body_start = cursor;
        }

        Ok((header, &text[body_start..]))
    }

    fn field<'a>(&self, inner: &'a str) -> Option<(&'a str, Value)> {
        let is_key = |key: &str| !key.is_empty() && key.chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-');

        let (key, value) = match inner.split_once(':') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (inner.trim(), ""),
        };

        if !is_key(key) {
            return None;
        }

        let value = match (value.is_empty(), self.list_fields.contains(key)) {
            (true, _) => Value::Bool(true),
            (false, true) => value.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(Value::from)
                .collect(),
            (false, false) => Value::from(value),
        };

        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    fn parser() -> HeaderParser {
        HeaderParser::new(["tags", "blog"])
    }

    #[test]
    fn parses_scalars_lists_and_flags() {
        let text = "<!-- title: Hello: World -->\n\
                    <!-- date: 2021-03-14 -->\n\
                    <!-- tags: Tutorial,  Beginner , -->\n\
                    <!-- blog -->\n\
                    <!-- mood: sunny -->\n\
                    \n\
                    # Heading\n";

        let (header, body) = parser().parse(text).unwrap();
        assert_eq!(header.get("title"), Some(&Value::from("Hello: World")));
        assert_eq!(header.get("date"), Some(&Value::from("2021-03-14")));
        assert_eq!(header.get("tags"), Some(&Value::from(vec!["Tutorial", "Beginner"])));
        assert_eq!(header.get("blog"), Some(&Value::Bool(true)));
        assert_eq!(header.get("mood"), Some(&Value::from("sunny")));
        assert_eq!(body, "\n# Heading\n");

        let keys: Vec<_> = header.iter().map(|(k, _)| &**k).collect();
        assert_eq!(keys, ["title", "date", "tags", "blog", "mood"]);
    }

    #[test]
    fn stops_at_first_non_header_line() {
        let text = "<!-- title: A -->\nbody line\n<!-- draft -->\n";
        let (header, body) = parser().parse(text).unwrap();
        assert_eq!(header.len(), 1);
        assert!(!header.is_draft());
        assert_eq!(body, "body line\n<!-- draft -->\n");
    }

    #[test]
    fn prose_comments_are_body() {
        let text = "<!-- remember to update this -->\ntext";
        let (header, body) = parser().parse(text).unwrap();
        assert!(header.is_empty());
        assert_eq!(body, text);
    }

    #[test]
    fn multi_line_comments_are_body() {
        let text = "<!-- title: A -->\n<!-- a comment\nspanning lines -->\ntext";
        let (header, body) = parser().parse(text).unwrap();
        assert_eq!(header.len(), 1);
        assert_eq!(body, "<!-- a comment\nspanning lines -->\ntext");
    }

    #[test]
    fn unterminated_header_is_malformed() {
        let text = "<!-- title: A -->\n<!-- date: 2021-01-01\nno closing marker";
        let error = parser().parse(text).unwrap_err();
        assert_eq!(error.kind(), Kind::MalformedHeader);
        assert_eq!(error.param("line").as_deref(), Some("2"));
    }

    #[test]
    fn draft_flags() {
        let (header, _) = parser().parse("<!-- draft -->\n").unwrap();
        assert!(header.is_draft());

        let (header, _) = parser().parse("<!-- draft: false -->\n").unwrap();
        assert!(!header.is_draft());

        let (header, _) = parser().parse("<!-- draft: yes -->\n").unwrap();
        assert!(header.is_draft());
    }

    #[test]
    fn empty_input_and_header_only() {
        let (header, body) = parser().parse("").unwrap();
        assert!(header.is_empty());
        assert_eq!(body, "");

        let (header, body) = parser().parse("<!-- title: T -->").unwrap();
        assert_eq!(header.len(), 1);
        assert_eq!(body, "");
    }
}
