//! Template loading and one-level inheritance.
//!
//! A template's logical name is its file stem. A stem of the form
//! `child_parent` inherits from `parent`: the child's raw body is spliced into
//! every `{{ body }}` placeholder of the parent. Merged bodies are computed on
//! first use and cached for the rest of the build. The merged template is
//! also reachable by its child name alone, so `post` resolves `post_page`.
//!
//! ```text
//! templates/html/
//! ├── page.html          "<html>{{ body }}</html>"
//! └── post_page.html     "<p>{{ title }}</p>"
//!
//! resolve("post_page") == resolve("post") == "<html><p>{{ title }}</p></html>"
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;

use crate::error::{Error, Kind, Result, Chainable};
use crate::fstree::{FsTree, EntryId};
use crate::protocol::Protocol;
use crate::substitute::placeholders;
use crate::value::Source;

const SEPARATOR: char = '_';
const BODY: &str = "body";

#[derive(Debug)]
struct TemplateNode {
    raw: Arc<str>,
    merged: OnceCell<Result<Arc<str>, Arc<Error>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Alias {
    Unique(Arc<str>),
    Ambiguous(Vec<Arc<str>>),
}

/// Raw templates per protocol with a cache of merged bodies.
#[derive(Debug, Default)]
pub struct TemplateStore {
    nodes: FxHashMap<(Protocol, Arc<str>), TemplateNode>,
    aliases: FxHashMap<(Protocol, Arc<str>), Alias>,
    merges: AtomicUsize,
}

impl TemplateStore {
    pub fn new() -> Self {
        TemplateStore::default()
    }

    /// Adds (or replaces) the raw template `name` for `protocol`.
    pub fn insert<N, B>(&mut self, protocol: Protocol, name: N, raw: B)
        where N: Into<Arc<str>>, B: Into<Arc<str>>
    {
        let name = name.into();
        if let Some((child, _)) = name.split_once(SEPARATOR) {
            let key = (protocol, Arc::from(child));
            let alias = match self.aliases.remove(&key) {
                None => Alias::Unique(name.clone()),
                Some(Alias::Unique(prev)) if prev == name => Alias::Unique(prev),
                Some(Alias::Unique(prev)) => Alias::Ambiguous(vec![prev, name.clone()]),
                Some(Alias::Ambiguous(mut names)) => {
                    if !names.contains(&name) {
                        names.push(name.clone());
                    }

                    Alias::Ambiguous(names)
                }
            };

            self.aliases.insert(key, alias);
        }

        let node = TemplateNode { raw: raw.into(), merged: OnceCell::new() };
        self.nodes.insert((protocol, name), node);
    }

    /// Loads every file directly inside the directory `root` as a template
    /// for `protocol`. Returns the number of templates loaded.
    pub fn load(&mut self, tree: &FsTree, root: EntryId, protocol: Protocol) -> Result<usize> {
        let mut count = 0;
        for &id in &tree[root].children {
            let entry = &tree[id];
            if !entry.is_file() {
                continue;
            }

            let name = entry.file_stem();
            if self.contains(protocol, name) {
                tracing::warn!(%protocol, template = name, path = %entry.path.display(),
                    "template is defined twice; keeping the last definition");
            }

            let raw = entry.read_text()
                .chain_with(|| error!("failed to read template", "template" => name))?;

            self.insert(protocol, name, raw);
            count += 1;
        }

        Ok(count)
    }

    /// `true` if a raw template is stored under exactly `name`.
    pub fn contains(&self, protocol: Protocol, name: &str) -> bool {
        self.nodes.contains_key(&(protocol, Arc::from(name)))
    }

    /// `true` if `resolve(protocol, name)` would find a template to merge.
    pub fn can_resolve(&self, protocol: Protocol, name: &str) -> bool {
        self.lookup(protocol, name).is_ok()
    }

    /// Returns the merged body of `name` for `protocol`.
    ///
    /// The structural merge runs at most once per `(name, protocol)` and per
    /// build; later calls return the cached body or the cached error.
    pub fn resolve(&self, protocol: Protocol, name: &str) -> Result<Arc<str>> {
        let (full_name, node) = self.lookup(protocol, name)?;
        let merged = node.merged.get_or_init(|| {
            self.merge(protocol, &full_name, &node.raw).map_err(Arc::new)
        });

        merged.clone().map_err(|e| error!([e.kind()] "template could not be merged",
            "template" => full_name,
            "protocol" => protocol,
            "cause" => e,
        ))
    }

    /// Number of inheritance merges performed so far.
    pub fn merges(&self) -> usize {
        self.merges.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn lookup(&self, protocol: Protocol, name: &str) -> Result<(Arc<str>, &TemplateNode)> {
        let key = (protocol, Arc::<str>::from(name));
        if let Some(node) = self.nodes.get(&key) {
            return Ok((key.1, node));
        }

        match self.aliases.get(&key) {
            Some(Alias::Unique(full_name)) => {
                tracing::debug!(%protocol, alias = name, template = &**full_name,
                    "resolving template through its child name");

                let full_key = (protocol, full_name.clone());
                match self.nodes.get(&full_key) {
                    Some(node) => Ok((full_key.1, node)),
                    None => err!([Kind::TemplateNotFound] "template not found",
                        "template" => full_name,
                        "protocol" => protocol,
                    ),
                }
            }
            Some(Alias::Ambiguous(names)) => err! {
                [Kind::TemplateInheritance] "template name is ambiguous",
                "template" => name,
                "protocol" => protocol,
                "candidates" => names.join(", "),
            },
            None => err! {
                [Kind::TemplateNotFound] "template not found",
                "template" => name,
                "protocol" => protocol,
                "help" => format!("expected a file named `{name}.{}`", protocol.suffix()),
            },
        }
    }

    fn merge(&self, protocol: Protocol, name: &str, child: &Arc<str>) -> Result<Arc<str>> {
        let mut parts = name.split(SEPARATOR);
        let (_, parent, rest) = (parts.next(), parts.next(), parts.next());
        let parent = match (parent, rest) {
            (None, _) => return Ok(child.clone()),
            (Some(parent), None) if !parent.is_empty() && !name.starts_with(SEPARATOR) => parent,
            (Some(_), None) => return err! {
                [Kind::TemplateInheritance] "inheriting template name is malformed",
                "template" => name,
                "help" => "inheriting templates are named `child_parent`",
            },
            (Some(_), Some(_)) => return err! {
                [Kind::TemplateInheritance] "multi-level template inheritance is unsupported",
                "template" => name,
                "help" => "a template may inherit from exactly one parent",
            },
        };

        let parent_node = self.nodes.get(&(protocol, Arc::from(parent)));
        let Some(parent_node) = parent_node else {
            return err! {
                [Kind::TemplateNotFound] "parent template not found",
                "template" => name,
                "parent" => parent,
                "protocol" => protocol,
            };
        };

        let Some(merged) = splice(&parent_node.raw, child) else {
            return err! {
                [Kind::TemplateInheritance] "parent template has no body placeholder",
                "template" => name,
                "parent" => parent,
                "help" => "add `{{ body }}` where the child's content belongs",
            };
        };

        self.merges.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%protocol, template = name, "merged template with its parent");
        Ok(Arc::from(merged))
    }
}

/// Replaces each `{{ body }}` in `parent` with `child`. `None` if there is no
/// body placeholder.
fn splice(parent: &str, child: &str) -> Option<String> {
    let mut out = String::with_capacity(parent.len() + child.len());
    let mut last = 0;
    for placeholder in placeholders(parent).filter(|p| p.name == BODY) {
        out.push_str(&parent[last..placeholder.range.start]);
        out.push_str(child);
        last = placeholder.range.end;
    }

    if last == 0 {
        return None;
    }

    out.push_str(&parent[last..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::context::{Context, Layer};
    use crate::error::Report;
    use crate::substitute::Substitution;
    use crate::vars;

    fn store() -> TemplateStore {
        let mut store = TemplateStore::new();
        store.insert(Protocol::Http, "page", "<html>{{ body }}</html>");
        store.insert(Protocol::Http, "post_page", "<p>hi</p>");
        store.insert(Protocol::Gemini, "page", "# {{ title }}\n{{body}}\n");
        store
    }

    #[test]
    fn merges_once_and_caches() {
        let store = store();
        assert_eq!(store.merges(), 0);

        let merged = store.resolve(Protocol::Http, "post_page").unwrap();
        assert_eq!(&*merged, "<html><p>hi</p></html>");
        assert_eq!(store.merges(), 1);

        let again = store.resolve(Protocol::Http, "post_page").unwrap();
        assert!(Arc::ptr_eq(&merged, &again));
        assert_eq!(store.merges(), 1);

        let alias = store.resolve(Protocol::Http, "post").unwrap();
        assert!(Arc::ptr_eq(&merged, &alias));
        assert_eq!(store.merges(), 1);
    }

    #[test]
    fn merged_template_substitutes() {
        let mut store = TemplateStore::new();
        store.insert(Protocol::Http, "page", "<html>{{ body }}</html>");
        store.insert(Protocol::Http, "post_page", "<p>{{ greeting }}</p>");

        let vars = vars!["greeting" => "hi", "body" => "unused"];
        let ctx = Context::new().with(Layer::Document, &vars);
        let template = store.resolve(Protocol::Http, "post_page").unwrap();
        let out = Substitution::default()
            .render(&template, &ctx, "post", &Report::new())
            .unwrap();

        assert_eq!(out, "<html><p>hi</p></html>");
    }

    #[test]
    fn templates_are_per_protocol() {
        let store = store();
        let error = store.resolve(Protocol::Gemini, "post_page").unwrap_err();
        assert_eq!(error.kind(), Kind::TemplateNotFound);

        let page = store.resolve(Protocol::Gemini, "page").unwrap();
        assert_eq!(&*page, "# {{ title }}\n{{body}}\n");
    }

    #[test]
    fn rejects_multi_level_and_malformed_names() {
        let mut store = store();
        store.insert(Protocol::Http, "a_post_page", "x");
        store.insert(Protocol::Http, "_page", "x");
        store.insert(Protocol::Http, "orphan_missing", "x");
        store.insert(Protocol::Http, "nobody", "<html></html>");
        store.insert(Protocol::Http, "child_nobody", "x");

        let kind = |name| store.resolve(Protocol::Http, name).unwrap_err().kind();
        assert_eq!(kind("a_post_page"), Kind::TemplateInheritance);
        assert_eq!(kind("_page"), Kind::TemplateInheritance);
        assert_eq!(kind("orphan_missing"), Kind::TemplateNotFound);
        assert_eq!(kind("child_nobody"), Kind::TemplateInheritance);

        // The failed merge is cached, too.
        assert_eq!(kind("a_post_page"), Kind::TemplateInheritance);
        assert_eq!(store.merges(), 0);
    }

    #[test]
    fn ambiguous_aliases_are_errors() {
        let mut store = store();
        store.insert(Protocol::Http, "base", "[{{ body }}]");
        store.insert(Protocol::Http, "post_base", "<p>hi</p>");

        let error = store.resolve(Protocol::Http, "post").unwrap_err();
        assert_eq!(error.kind(), Kind::TemplateInheritance);
        assert_eq!(&*store.resolve(Protocol::Http, "post_base").unwrap(), "[<p>hi</p>]");
    }

    #[test]
    fn every_body_placeholder_is_replaced() {
        assert_eq!(splice("{{ body }}|{{body}}|{{ x }}", "c").as_deref(), Some("c|c|{{ x }}"));
        assert_eq!(splice("{{ x }}", "c"), None);
    }

    #[test]
    fn loads_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("html");
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("page.html"), "<main>{{ body }}</main>").unwrap();
        fs::write(root.join("post_page.html"), "post").unwrap();
        fs::write(root.join("nested/ignored.html"), "x").unwrap();

        let tree = FsTree::build(&root).unwrap();
        let mut store = TemplateStore::new();
        let count = store.load(&tree, tree.root_id(), Protocol::Http).unwrap();

        assert_eq!(count, 2);
        assert!(store.contains(Protocol::Http, "page"));
        assert!(!store.contains(Protocol::Http, "ignored"));
        assert_eq!(&*store.resolve(Protocol::Http, "post").unwrap(), "<main>post</main>");
    }
}
