use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::document::Document;
use crate::util::normalize;
use crate::value::Value;

/// One value of a taxonomy and the documents that declare it.
///
/// Values are identified by their normalized form, so `Tutorial` and
/// `tutorial` are the same value; the first spelling seen is displayed.
#[derive(Debug, Clone)]
pub struct TaxonomyValue<'d> {
    pub display: Arc<str>,
    pub normalized: Arc<str>,
    /// Members in discovery order, each at most once.
    pub members: Vec<&'d Document>,
}

/// The values of one taxonomy, in first-seen order.
#[derive(Debug, Clone)]
pub struct Membership<'d> {
    pub taxonomy: Arc<str>,
    values: Vec<TaxonomyValue<'d>>,
    positions: FxHashMap<Arc<str>, usize>,
    /// Every document in the taxonomy under any value, in discovery order.
    all: Vec<&'d Document>,
}

impl<'d> Membership<'d> {
    /// Scans `documents`, in order, for the header field named `taxonomy`.
    ///
    /// A list or comma-separated string declares one value per entry. A bare
    /// flag (`<!-- blog -->`) declares the empty value. Drafts never belong
    /// to a taxonomy.
    pub fn scan(taxonomy: &str, documents: &'d [Document]) -> Self {
        let mut membership = Membership {
            taxonomy: Arc::from(taxonomy),
            values: vec![],
            positions: FxHashMap::default(),
            all: vec![],
        };

        for doc in documents.iter().filter(|d| !d.header.is_draft()) {
            let Some(field) = doc.header.get(taxonomy) else { continue };
            let declared: Vec<&str> = match field {
                Value::Bool(true) => vec![""],
                Value::String(s) => s.split(',').map(str::trim).filter(|v| !v.is_empty()).collect(),
                Value::Array(_) => field.strings().map(str::trim).filter(|v| !v.is_empty()).collect(),
                _ => vec![],
            };

            for value in declared {
                membership.add(value, doc);
            }
        }

        membership
    }

    fn add(&mut self, display: &str, doc: &'d Document) {
        let normalized = normalize(display);
        let position = match self.positions.get(&*normalized) {
            Some(&i) => i,
            None => {
                let normalized: Arc<str> = normalized.into();
                self.positions.insert(normalized.clone(), self.values.len());
                self.values.push(TaxonomyValue {
                    display: display.into(),
                    normalized,
                    members: vec![],
                });

                self.values.len() - 1
            }
        };

        let members = &mut self.values[position].members;
        if !members.iter().any(|m| std::ptr::eq(*m, doc)) {
            members.push(doc);
        }

        if !self.all.last().map_or(false, |m| std::ptr::eq(*m, doc)) {
            self.all.push(doc);
        }
    }

    pub fn values(&self) -> &[TaxonomyValue<'d>] {
        &self.values
    }

    pub fn get(&self, normalized: &str) -> Option<&TaxonomyValue<'d>> {
        self.positions.get(normalized).map(|&i| &self.values[i])
    }

    /// Every member document regardless of value, each once.
    pub fn documents(&self) -> &[&'d Document] {
        &self.all
    }

    pub fn contains(&self, doc: &Document) -> bool {
        self.all.iter().any(|m| std::ptr::eq(*m, doc))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::document::Layout;
    use crate::error::Report;
    use crate::header::HeaderParser;
    use crate::protocol::Protocol;

    fn documents(sources: &[(&str, &str)]) -> Vec<Document> {
        let parser = HeaderParser::new(["tags", "blog"]);
        let layout = Layout { protocol: Protocol::Http, base_path: "", date_format: None, page_views: None };
        let report = Report::new();
        sources.iter()
            .map(|(path, text)| {
                let (header, body) = parser.parse(text).unwrap();
                Document::new(Path::new(path), header, body, &layout, &report)
            })
            .collect()
    }

    fn members(m: &Membership<'_>, value: &str) -> Vec<String> {
        m.get(value).unwrap().members.iter().map(|d| d.sort_key("file_name")).collect()
    }

    #[test]
    fn documents_belong_to_every_declared_value() {
        let docs = documents(&[
            ("a.md", "<!-- tags: Tutorial, Beginner -->\n"),
            ("b.md", "<!-- tags: tutorial, Café, Tutorial -->\n"),
            ("c.md", "<!-- title: untagged -->\n"),
            ("d.md", "<!-- tags: Café -->\n<!-- draft -->\n"),
            ("e.md", "<!-- tags: Beginner -->\n"),
        ]);

        let tags = Membership::scan("tags", &docs);
        let values: Vec<_> = tags.values().iter().map(|v| (&*v.display, &*v.normalized)).collect();
        assert_eq!(values, [("Tutorial", "tutorial"), ("Beginner", "beginner"), ("Café", "cafe")]);

        assert_eq!(members(&tags, "tutorial"), ["a", "b"]);
        assert_eq!(members(&tags, "beginner"), ["a", "e"]);
        assert_eq!(members(&tags, "cafe"), ["b"]);
        assert!(tags.get("untagged").is_none());

        let all: Vec<_> = tags.documents().iter().map(|d| d.sort_key("file_name")).collect();
        assert_eq!(all, ["a", "b", "e"]);
        assert!(!tags.contains(&docs[2]));
        assert!(!tags.contains(&docs[3]));
    }

    #[test]
    fn flags_declare_the_empty_value() {
        let docs = documents(&[
            ("a.md", "<!-- blog -->\n"),
            ("b.md", "<!-- blog: -->\n"),
            ("c.md", "hello"),
        ]);

        let blog = Membership::scan("blog", &docs);
        assert_eq!(blog.len(), 1);
        assert_eq!(&*blog.values()[0].normalized, "");
        assert_eq!(blog.values()[0].members.len(), 2);
    }

    #[test]
    fn unconfigured_fields_split_on_commas() {
        let docs = documents(&[("a.md", "<!-- series: One, Two -->\n")]);
        let series = Membership::scan("series", &docs);
        assert_eq!(series.len(), 2);
        assert!(series.get("two").is_some());
    }
}
