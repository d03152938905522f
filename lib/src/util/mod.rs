mod macros;

pub use macros::*;

/// Derives the URL-safe identifier of a taxonomy value: accents are
/// transliterated to ASCII, letters are lowercased, and spaces become
/// hyphens. Nothing else is touched.
///
/// The function is idempotent, so it is safe to apply to values that may
/// already be normalized.
///
/// ```rust
/// use stencil::util::normalize;
///
/// assert_eq!(normalize("Café"), "cafe");
/// assert_eq!(normalize("Getting Started"), "getting-started");
/// assert_eq!(normalize(&normalize("Ægir Über")), normalize("Ægir Über"));
/// ```
pub fn normalize(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    for ch in value.chars() {
        let ascii = match ch.is_ascii() {
            true => None,
            false => Some(deunicode::deunicode_char(ch).unwrap_or("")),
        };

        match ascii {
            None => output.push(ch),
            Some(s) => output.push_str(s),
        }
    }

    output.make_ascii_lowercase();
    output.replace(' ', "-")
}

/// Joins URL path segments with single `/`s. Empty segments are skipped and
/// a leading `/` on the first non-empty segment is kept.
pub fn join_url<'a, I: IntoIterator<Item = &'a str>>(parts: I) -> String {
    let mut output = String::new();
    for part in parts {
        let trimmed = part.trim_matches('/');
        if output.is_empty() && part.starts_with('/') {
            output.push('/');
        }

        if trimmed.is_empty() {
            continue;
        }

        if !output.is_empty() && !output.ends_with('/') {
            output.push('/');
        }

        output.push_str(trimmed);
    }

    output
}


#[cfg(test)]
mod normalize_tests {
    use crate::util::normalize;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Tutorial"), "tutorial");
        assert_eq!(normalize("Café Time"), "cafe-time");
        assert_eq!(normalize("cafe-time"), "cafe-time");
        assert_eq!(normalize("Æúű"), "aeuu");
        assert_eq!(normalize(" two  spaces "), "-two--spaces-");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        let inputs = [
            "Café", "Getting Started", "ÆØÅ Mixed Case", "Žluťoučký kůň",
            "北京 city", "emoji 🎉 tag", "already-normal", "  ", "ß and ẞ",
        ];

        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
            assert!(once.is_ascii(), "not ascii: {once:?}");
            assert!(!once.contains(' '), "contains space: {once:?}");
        }
    }
}
