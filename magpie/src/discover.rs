use std::path::{Path, PathBuf};

use stencil::rayon::prelude::*;
use stencil::{error, Protocol, Site, SourceFile};
use stencil::config::Config;
use stencil::document::Document;
use stencil::error::{Chainable, Report, Result};
use stencil::fstree::{Entry, EntryId, FsTree};
use stencil::markdown::Converter;
use stencil::page_views::PageViews;
use stencil::template::TemplateStore;
use stencil::value::Source;

use crate::{CONTENT_DIR, STATIC_DIR, TEMPLATE_DIR};
use crate::util::{dircheck, hidden, required_dir};

/// A project on disk:
///
/// ```text
/// config.toml | config.json
/// content/           documents, at any depth
/// templates/html/    http templates
/// templates/gmi/     gemini templates
/// static/html/       copied as-is into the http output
/// static/gmi/        copied as-is into the gemini output
/// ```
#[derive(Debug)]
pub struct Magpie {
    pub tree: FsTree,
    pub config: Config,
    pub page_views: Option<PageViews>,
    pub output: PathBuf,
    pub content_root: EntryId,
    pub template_root: Option<EntryId>,
    pub static_root: Option<EntryId>,
}

impl Magpie {
    pub fn new<I, O>(input: I, output: O, report: &Report) -> Result<Self>
        where I: AsRef<Path>, O: AsRef<Path>
    {
        let tree = FsTree::build(input)?;
        let config = crate::config::discover(&tree)?;
        let page_views = crate::config::page_views(&tree, &config, report)?;
        Ok(Magpie {
            output: output.as_ref().to_path_buf(),
            content_root: required_dir(&tree, None, CONTENT_DIR)?,
            template_root: dircheck(&tree, None, TEMPLATE_DIR, false)?,
            static_root: dircheck(&tree, None, STATIC_DIR, false)?,
            page_views,
            config,
            tree,
        })
    }

    pub fn site<'a>(&'a self, templates: &'a TemplateStore, converter: &'a dyn Converter) -> Site<'a> {
        let site = Site::new(&self.config, templates, converter);
        match &self.page_views {
            Some(page_views) => site.with_page_views(page_views),
            None => site,
        }
    }

    /// Every document under `content/` that some protocol can build, read in
    /// parallel, with paths relative to `content/`.
    pub fn sources(&self) -> Result<Vec<SourceFile>> {
        let content_root = &self.tree[self.content_root];
        let eligible = |e: &Entry| e.file_ext()
            .map_or(false, |ext| Protocol::ALL.iter().any(|&p| Document::is_eligible(ext, p)));

        let entries: Vec<&Entry> = self.tree.iter_breadth_first(content_root.id)
            .files()
            .filter(|e| !self.is_hidden(e, content_root) && eligible(e))
            .collect();

        let sources = entries.par_iter()
            .map(|&entry| {
                let text = entry.read_text()?;
                let path = entry.path_relative_to(content_root).unwrap_or(&*entry.path);
                Ok(SourceFile::new(path, text))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(count = sources.len(), "discovered sources");
        Ok(sources)
    }

    /// Templates for every protocol, from `templates/{suffix}/`.
    pub fn templates(&self) -> Result<TemplateStore> {
        let mut store = TemplateStore::new();
        let Some(root) = self.template_root else {
            return Ok(store);
        };

        for protocol in Protocol::ALL {
            let Some(dir) = dircheck(&self.tree, Some(root), protocol.suffix(), false)? else {
                tracing::debug!(%protocol, "no template directory");
                continue;
            };

            let count = store.load(&self.tree, dir, protocol)
                .chain_with(|| error!("failed to load templates", "protocol" => protocol))?;

            tracing::info!(%protocol, count, "loaded templates");
        }

        Ok(store)
    }

    /// Files under `static/{suffix}/` with their paths relative to it.
    pub fn static_files(&self, protocol: Protocol) -> Vec<(&Entry, &Path)> {
        let Some(root) = self.static_root else {
            return vec![];
        };

        let Some(dir) = self.tree.get_dir(root, protocol.suffix()) else {
            return vec![];
        };

        self.tree.iter_breadth_first(dir.id)
            .files()
            .filter(|e| !self.is_hidden(e, dir))
            .filter_map(|e| Some((e, e.path_relative_to(dir)?)))
            .collect()
    }

    /// `true` if `entry` or any directory between it and `root` is hidden.
    fn is_hidden(&self, entry: &Entry, root: &Entry) -> bool {
        let mut current = Some(entry);
        while let Some(e) = current.filter(|e| e.id != root.id) {
            if hidden(&e.file_name) {
                return true;
            }

            current = e.parent.map(|id| &self.tree[id]);
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::util::project;

    #[test]
    fn discovers_sources_templates_and_static_files() {
        let dir = project(&[
            ("config.toml", "domain = \"example.com\"\n"),
            ("content/a.md", "a"),
            ("content/blog/b.gmi", "b"),
            ("content/blog/.draft.md", "hidden"),
            ("content/_partials/c.md", "hidden"),
            ("content/image.png", "not text, not eligible"),
            ("templates/html/page.html", "{{ body }}"),
            ("templates/html/post_page.html", "<article>{{ body }}</article>"),
            ("templates/gmi/page.gmi", "{{ body }}"),
            ("static/html/css/site.css", "body {}"),
        ]);

        let report = Report::new();
        let magpie = Magpie::new(dir.path(), dir.path().join("public"), &report).unwrap();
        assert_eq!(magpie.config.domain, "example.com");
        assert!(magpie.page_views.is_none());

        let sources = magpie.sources().unwrap();
        let paths: Vec<_> = sources.iter().map(|s| &*s.path).collect();
        assert_eq!(paths, [Path::new("a.md"), Path::new("blog/b.gmi")]);

        let templates = magpie.templates().unwrap();
        assert!(templates.can_resolve(Protocol::Http, "post"));
        assert!(templates.contains(Protocol::Gemini, "page"));
        assert!(!templates.contains(Protocol::Gemini, "post_page"));

        let statics = magpie.static_files(Protocol::Http);
        assert_eq!(statics.len(), 1);
        assert_eq!(statics[0].1, Path::new("css/site.css"));
        assert!(magpie.static_files(Protocol::Gemini).is_empty());
    }

    #[test]
    fn json_config_and_page_views() {
        let dir = project(&[
            ("config.json", r#"{ "domain": "example.org", "page_views_file": "views.txt" }"#),
            ("views.txt", "/a:12\nnonsense\n"),
            ("content/a.md", "a"),
        ]);

        let report = Report::new();
        let magpie = Magpie::new(dir.path(), dir.path().join("public"), &report).unwrap();
        assert_eq!(magpie.config.domain, "example.org");
        assert_eq!(magpie.page_views.as_ref().unwrap().get("/a"), Some(12));
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn missing_content_and_invalid_config_are_errors() {
        let dir = project(&[("templates/html/page.html", "")]);
        assert!(Magpie::new(dir.path(), dir.path().join("public"), &Report::new()).is_err());

        let dir = project(&[
            ("config.toml", "[[taxonomies]]\nid = \"tags\"\n[[taxonomies]]\nid = \"tags\"\n"),
            ("content/a.md", "a"),
        ]);

        let error = Magpie::new(dir.path(), dir.path().join("public"), &Report::new()).unwrap_err();
        assert_eq!(error.kind(), stencil::error::Kind::Config);
    }
}
