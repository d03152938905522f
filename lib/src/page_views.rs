use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Kind, Report};

/// View counts keyed by a document's `relative_dir_path`, read from lines of
/// the form `path:count`.
#[derive(Debug, Default, Clone)]
pub struct PageViews {
    counts: FxHashMap<Arc<str>, i64>,
}

impl PageViews {
    /// Parses `text`. Lines that don't match `path:count` are skipped with a
    /// warning; blank lines are ignored.
    pub fn parse(text: &str, report: &Report) -> Self {
        let mut counts = FxHashMap::default();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parsed = line.rsplit_once(':')
                .and_then(|(path, count)| Some((path.trim(), count.trim().parse::<i64>().ok()?)));

            match parsed {
                Some((path, count)) => { counts.insert(Arc::from(path), count); }
                None => report.warn(error!([Kind::Config] "malformed page views entry",
                    "line" => i + 1,
                    "content" => line,
                    "expected" => "path:count",
                )),
            }
        }

        PageViews { counts }
    }

    pub fn get(&self, path: &str) -> Option<i64> {
        self.counts.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counts_and_skips_bad_lines() {
        let report = Report::new();
        let views = PageViews::parse("/blog/a:10\n\n/blog/b: 3 \nnonsense\n/c:many\n", &report);

        assert_eq!(views.len(), 2);
        assert_eq!(views.get("/blog/a"), Some(10));
        assert_eq!(views.get("/blog/b"), Some(3));
        assert_eq!(views.get("/blog/c"), None);
        assert_eq!(report.warnings().count(), 2);
        assert!(!report.has_failures());
    }
}
