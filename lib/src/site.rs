//! The site model assembler: one full build for one protocol.
//!
//! ```text
//! sources ──parse──▶ documents ──┬──▶ taxonomy 1 ──commit──▶ globals
//!  (par)                         ├──▶ taxonomy 2 ──commit──▶ globals
//!                                │         ⋮
//!                                └──▶ pages (par, with final globals)
//! ```

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Local};
use derive_more::Debug;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::artifact::{FileArtifact, RenderedArtifact};
use crate::config::Config;
use crate::context::{Globals, Layer, Scope, Vars};
use crate::document::{Document, Layout};
use crate::error::{Chainable, Kind, Report, Result};
use crate::header::HeaderParser;
use crate::markdown::Converter;
use crate::page_views::PageViews;
use crate::protocol::Protocol;
use crate::substitute::Substitution;
use crate::taxonomy::{IndexBuilder, Membership, Renderer};
use crate::template::TemplateStore;
use crate::{time, vars};

pub const GENERATOR: &str = concat!("stencil ", env!("CARGO_PKG_VERSION"));

/// A source document as read from disk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the content root.
    pub path: Arc<Path>,
    pub text: Arc<str>,
}

impl SourceFile {
    pub fn new(path: impl Into<Arc<Path>>, text: impl Into<Arc<str>>) -> Self {
        SourceFile { path: path.into(), text: text.into() }
    }
}

/// The outcome of one build.
#[derive(Debug)]
pub struct SiteModel {
    pub protocol: Protocol,
    /// Pages and `file` indexes, each path at most once.
    pub files: Vec<FileArtifact>,
    /// Every `variable` index output.
    pub globals: Globals,
    pub report: Report,
}

#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    config: &'a Config,
    templates: &'a TemplateStore,
    #[debug(ignore)]
    converter: &'a dyn Converter,
    page_views: Option<&'a PageViews>,
    now: DateTime<FixedOffset>,
}

impl<'a> Site<'a> {
    pub fn new(config: &'a Config, templates: &'a TemplateStore, converter: &'a dyn Converter) -> Self {
        Site {
            config,
            templates,
            converter,
            page_views: None,
            now: DateTime::<FixedOffset>::from(Local::now()),
        }
    }

    pub fn with_page_views(mut self, page_views: &'a PageViews) -> Self {
        self.page_views = Some(page_views);
        self
    }

    /// Fixes the build time seen by `current_year` and `rfc3339_now`.
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = now;
        self
    }

    /// Builds the complete site model for `protocol` from `sources`.
    ///
    /// Never fails as a whole: problems with individual documents or indexes
    /// are in the returned model's report.
    pub fn build(&self, protocol: Protocol, sources: &[SourceFile]) -> SiteModel {
        let report = Report::new();
        let parser = HeaderParser::new(self.config.taxonomy_ids());
        let layout = Layout {
            protocol,
            base_path: &self.config.base_path,
            date_format: self.config.custom_date_format.as_deref(),
            page_views: self.page_views,
        };

        let documents: Vec<Document> = time!("document parsing", sources.par_iter()
            .filter_map(|source| self.document(source, &parser, &layout, &report))
            .collect());

        let system = self.system_vars(protocol);
        let config = self.config.variables();
        let renderer = Renderer {
            protocol,
            templates: self.templates,
            substitution: Substitution::new(self.config.unresolved),
            system: &system,
            config: &config,
            report: &report,
        };

        let mut globals = Globals::default();
        let mut files = vec![];
        for taxonomy in &self.config.taxonomies {
            let membership = Membership::scan(&taxonomy.id, &documents);
            let output = time!(format!("taxonomy `{}`", taxonomy.id), {
                IndexBuilder::new(renderer, taxonomy, &membership, &globals).build()
            });

            for artifact in output.artifacts {
                match artifact {
                    RenderedArtifact::File(file) => files.push(file),
                    RenderedArtifact::Variable(binding) => {
                        if let Err(e) = globals.bind(binding) {
                            report.record(e);
                        }
                    }
                }
            }
        }

        let pages: Vec<FileArtifact> = time!("page rendering", documents.par_iter()
            .filter_map(|doc| match self.page(doc, &renderer, &globals) {
                Ok(page) => Some(page),
                Err(e) => {
                    report.record(e);
                    None
                }
            })
            .collect());

        let mut seen = FxHashSet::default();
        files.extend(pages);
        files.retain(|file| {
            if seen.insert(file.path.clone()) {
                return true;
            }

            report.record(error!([Kind::Config] "two outputs have the same path",
                "path" => file.path.display(),
                "help" => "check `output_path` overrides and sources with the same stem",
            ));

            false
        });

        tracing::info!(%protocol, documents = documents.len(), files = files.len(),
            variables = globals.len(), "build complete");

        SiteModel { protocol, files, globals, report }
    }

    /// System context layer for one protocol.
    pub fn system_vars(&self, protocol: Protocol) -> Vars {
        vars! {
            "scheme" => protocol.scheme(self.config.ssl_enabled),
            "domain" => &*self.config.domain,
            "base_path" => &*self.config.base_path,
            "current_year" => self.now.year(),
            "rfc3339_now" => self.now.to_rfc3339(),
            "generator" => GENERATOR,
            "protocol" => protocol.name(),
            "file_suffix" => protocol.suffix(),
        }
    }

    fn document(
        &self,
        source: &SourceFile,
        parser: &HeaderParser,
        layout: &Layout<'_>,
        report: &Report,
    ) -> Option<Document> {
        let ext = source.path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if !Document::is_eligible(ext, layout.protocol) {
            tracing::debug!(path = %source.path.display(), protocol = %layout.protocol,
                "source isn't eligible for protocol");

            return None;
        }

        let skip = || error!("skipping document", "document" => source.path.display());
        let (header, body) = match parser.parse(&source.text) {
            Ok(parsed) => parsed,
            Err(e) => {
                report.record(e.chain(skip()));
                return None;
            }
        };

        if header.is_draft() {
            tracing::debug!(path = %source.path.display(), "skipping draft");
            return None;
        }

        let body = match Document::is_markdown(ext) {
            true => match self.converter.convert(layout.protocol, body) {
                Ok(converted) => converted,
                Err(e) => {
                    report.record(e.chain(skip()));
                    return None;
                }
            },
            false => body.to_string(),
        };

        Some(Document::new(source.path.clone(), header, body, layout, report))
    }

    fn page(&self, doc: &Document, renderer: &Renderer<'_>, globals: &Globals) -> Result<FileArtifact> {
        let origin = doc.source.display().to_string();
        let context = || error!("failed to render page", "document" => &origin);
        let name = self.template_for(doc, renderer.report);
        let template = renderer.template(name).chain_with(context)?;

        let ctx = renderer.context(&[globals as &dyn Scope]).with(Layer::Document, &doc.vars);
        let body = renderer.document_body(doc, &ctx).chain_with(context)?;
        let ctx = ctx.with(Layer::Document, &body);
        let content = renderer.fill(&template, &ctx, &origin).chain_with(context)?;

        tracing::info!(source = %origin, target = %doc.target.display(), "generated page");
        Ok(FileArtifact::new(&doc.target, content))
    }

    /// The document's `template` header, else the `document_template` of the
    /// first taxonomy it belongs to that has one, else the default template.
    fn template_for<'d>(&'d self, doc: &'d Document, report: &Report) -> &'d str {
        if let Some(template) = doc.template() {
            return template;
        }

        let candidates: Vec<&str> = self.config.taxonomies.iter()
            .filter(|t| doc.header.contains(&t.id))
            .filter_map(|t| t.document_template.as_deref())
            .collect();

        match candidates.as_slice() {
            [] => &self.config.default_template,
            [first, rest @ ..] => {
                if rest.iter().any(|t| t != first) {
                    report.warn(error!([Kind::Config] "document matches several taxonomy templates",
                        "document" => doc.source.display(),
                        "candidates" => candidates.join(", "),
                        "using" => first,
                    ));
                }

                *first
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Component;

    use super::*;
    use crate::config::{Direction, IndexScope, OutputKind};
    use crate::markdown::Markdown;
    use crate::substitute::Unresolved;
    use crate::value::{Format, Toml};

    const CONFIG: &str = r#"
        domain = "example.com"
        base_path = ""
        author = "Ada"

        [[taxonomies]]
        id = "tags"
        title = "Tags"

        [[taxonomies.posts_indexes]]
        id = "index"
        template = "tags-index"
        item_template = "item"

        [[taxonomies.value_indexes]]
        id = "list"
        template = "tags-list"
        item_template = "tag-item"
        order_by = "name"
        order_direction = "asc"
        inlined_index_id = "index"
        output_type = "file"
    "#;

    fn templates() -> TemplateStore {
        let mut store = TemplateStore::new();
        store.insert(Protocol::Http, "page", "<html><title>{{ title }}</title>{{ body }}</html>");
        store.insert(Protocol::Http, "post_page", "<article>{{ body }}</article>");
        store.insert(Protocol::Http, "tags-index", "<ul>{{ body }}</ul>");
        store.insert(Protocol::Http, "item", "<li>{{ title }}</li>");
        store.insert(Protocol::Http, "tags-list", "<h1>{{ title }}</h1>{{ body }}");
        store.insert(Protocol::Http, "tag-item", "<h2>{{ taxonomy_value }} ({{ taxonomy_value_posts_count }})</h2>{{ taxonomy_value_posts_index }}");
        store
    }

    fn build(config: &Config, templates: &TemplateStore, sources: &[SourceFile]) -> SiteModel {
        Site::new(config, templates, &Markdown::new()).build(Protocol::Http, sources)
    }

    fn source(path: &str, text: &str) -> SourceFile {
        SourceFile::new(Path::new(path), text)
    }

    fn file<'m>(model: &'m SiteModel, path: &str) -> Option<&'m str> {
        model.files.iter()
            .find(|f| f.path == Path::new(path))
            .map(|f| &*f.content)
    }

    #[test]
    fn end_to_end_tags_index() {
        let config: Config = Toml::from_str(CONFIG).unwrap();
        let templates = templates();
        let sources = [
            source("getting-started.md", "<!-- title: Getting Started -->\n\
                <!-- tags: Tutorial, Beginner -->\n<!-- template: post -->\n\nHello {{ author }}.\n"),
            source("untagged.md", "<!-- title: Plain -->\nJust text.\n"),
        ];

        let model = build(&config, &templates, &sources);
        assert!(!model.report.has_failures(), "{}", model.report);

        let item = "<li>Getting Started</li>";
        assert_eq!(model.globals.get("tags_index_tutorial"), Some("<ul><li>Getting Started</li></ul>"));
        assert_eq!(model.globals.get("tags_index_beginner").unwrap().matches(item).count(), 1);
        assert_eq!(model.globals.len(), 2);

        let page = file(&model, "getting-started/index.html").unwrap();
        assert_eq!(page, "<html><title>Getting Started</title><article><p>Hello Ada.</p>\n</article></html>");

        let plain = file(&model, "untagged/index.html").unwrap();
        assert_eq!(plain, "<html><title>Plain</title><p>Just text.</p>\n</html>");

        let list = file(&model, "tags/list.html").unwrap();
        assert_eq!(list, "<h1>Tags</h1>\
            <h2>Beginner (1)</h2><ul><li>Getting Started</li></ul>\
            <h2>Tutorial (1)</h2><ul><li>Getting Started</li></ul>");
    }

    #[test]
    fn drafts_produce_nothing() {
        let config: Config = Toml::from_str(CONFIG).unwrap();
        let templates = templates();
        let sources = [
            source("draft.md", "<!-- title: Secret -->\n<!-- tags: Tutorial -->\n<!-- draft -->\nshh"),
            source("public.md", "<!-- title: Public -->\n<!-- tags: Rust -->\nhi"),
        ];

        let model = build(&config, &templates, &sources);
        assert_eq!(model.files.len(), 2);
        assert!(file(&model, "draft/index.html").is_none());
        assert!(model.globals.get("tags_index_tutorial").is_none());
        assert!(model.files.iter().all(|f| !f.content.contains("Secret")));
        assert!(model.globals.names().all(|n| !model.globals.get(n).unwrap().contains("Secret")));
    }

    #[test]
    fn document_and_system_variables_shadow_generated_ones() {
        let mut config: Config = Toml::from_str(CONFIG).unwrap();
        config.taxonomies[0].posts_indexes[0].scope = IndexScope::Taxonomy;
        config.taxonomies[0].value_indexes.clear();
        config.taxonomies[0].id = "domain".into();
        config.taxonomies[0].posts_indexes[0].id = "x".into();

        let mut templates = templates();
        templates.insert(Protocol::Http, "page", "{{ domain_x }}|{{ title }}|{{ domain }}");

        let sources = [source("a.md", "<!-- title: A -->\n<!-- domain: d -->\n<!-- domain_x: mine -->\n")];
        let model = build(&config, &templates, &sources);

        assert_eq!(model.globals.get("domain_x"), Some("<ul><li>A</li></ul>"));
        assert_eq!(file(&model, "a/index.html"), Some("mine|A|d"));
    }

    #[test]
    fn missing_templates_fail_only_their_render() {
        let mut config: Config = Toml::from_str(CONFIG).unwrap();
        config.taxonomies[0].posts_indexes[0].template = "missing".into();
        let templates = templates();
        let sources = [
            source("a.md", "<!-- tags: x -->\n<!-- template: nope -->\na"),
            source("b.md", "<!-- tags: x -->\nb"),
        ];

        let model = build(&config, &templates, &sources);
        assert!(model.report.has_failures());
        assert_eq!(model.report.count(Kind::ConfigReference), 2);
        assert_eq!(model.report.count(Kind::TemplateNotFound), 1);
        assert!(file(&model, "a/index.html").is_none());
        assert!(file(&model, "b/index.html").is_some());
        assert!(model.globals.is_empty());
    }

    #[test]
    fn unresolved_policy_applies_to_pages() {
        let mut config: Config = Toml::from_str(CONFIG).unwrap();
        config.taxonomies.clear();
        let mut templates = templates();
        templates.insert(Protocol::Http, "page", "[{{ nothing }}]");
        let sources = [source("a.md", "a")];

        let model = build(&config, &templates, &sources);
        assert_eq!(file(&model, "a/index.html"), Some("[]"));
        assert_eq!(model.report.count(Kind::UnresolvedVariable), 1);
        assert!(!model.report.has_failures());

        config.unresolved = Unresolved::Fail;
        let model = build(&config, &templates, &sources);
        assert!(file(&model, "a/index.html").is_none());
        assert!(model.report.has_failures());
    }

    #[test]
    fn malformed_headers_and_ineligible_sources_are_skipped() {
        let config: Config = Toml::from_str(CONFIG).unwrap();
        let templates = templates();
        let sources = [
            source("broken.md", "<!-- title: never closed\ntext"),
            source("native.gmi", "gemini only"),
            source("ok.html", "<!-- title: Native -->\n<b>raw</b>"),
        ];

        let model = build(&config, &templates, &sources);
        assert!(!model.report.has_failures());
        assert_eq!(model.report.count(Kind::MalformedHeader), 1);
        assert_eq!(model.files.len(), 2);
        assert!(file(&model, "tags/list.html").is_some());
        assert_eq!(file(&model, "ok/index.html"), Some("<html><title>Native</title><b>raw</b></html>"));
    }

    #[test]
    fn file_outputs_and_system_variables() {
        let mut config: Config = Toml::from_str(CONFIG).unwrap();
        let index = &mut config.taxonomies[0].posts_indexes[0];
        index.output.kind = OutputKind::File;
        index.output.suffix = Some("xml".into());
        config.taxonomies[0].value_indexes[0].output.path = Some("/{{ taxonomy_id }}.html".into());
        config.taxonomies[0].value_indexes[0].inlined_index_id = None;

        let mut templates = templates();
        templates.insert(Protocol::Http, "page", "{{ scheme }}://{{ domain }} {{ current_year }} {{ generator }}");

        let now = DateTime::parse_from_rfc3339("2024-05-06T07:08:09+00:00").unwrap();
        let sources = [source("a.md", "<!-- tags: Café Time -->\n")];
        let model = Site::new(&config, &templates, &Markdown::new())
            .with_now(now)
            .build(Protocol::Http, &sources);

        assert!(!model.report.has_failures(), "{}", model.report);
        assert!(file(&model, "tags/cafe-time/index.xml").is_some());
        assert!(file(&model, "tags.html").is_some());
        assert_eq!(file(&model, "a/index.html"), Some(&*format!("http://example.com 2024 {GENERATOR}")));
    }

    #[test]
    fn value_indexes_sort_by_name_unless_told_otherwise() {
        let toml = CONFIG.replace("order_by = \"name\"", "").replace("order_direction = \"asc\"", "");
        let mut config: Config = Toml::from_str(&toml).unwrap();
        let templates = templates();
        let sources = [
            source("z.md", "<!-- title: Z -->\n<!-- tags: Zed -->\n"),
            source("a.md", "<!-- title: A -->\n<!-- tags: Alpha -->\n"),
        ];

        let model = build(&config, &templates, &sources);
        assert_eq!(file(&model, "tags/list.html"), Some("<h1>Tags</h1>\
            <h2>Alpha (1)</h2><ul><li>A</li></ul>\
            <h2>Zed (1)</h2><ul><li>Z</li></ul>"));

        config.taxonomies[0].value_indexes[0].order_direction = Direction::Desc;
        let model = build(&config, &templates, &sources);
        assert_eq!(file(&model, "tags/list.html"), Some("<h1>Tags</h1>\
            <h2>Zed (1)</h2><ul><li>Z</li></ul>\
            <h2>Alpha (1)</h2><ul><li>A</li></ul>"));
    }

    #[test]
    fn index_files_stay_under_the_output_root() {
        let mut config: Config = Toml::from_str(CONFIG).unwrap();
        config.taxonomies[0].posts_indexes[0].output.kind = OutputKind::File;
        config.taxonomies[0].value_indexes[0].output.path = Some("/../{{ taxonomy_id }}.html".into());

        let templates = templates();
        let sources = [
            source("a.md", "<!-- tags: ../../../tmp/escaped -->\n"),
            source("b.md", "<!-- tags: Rust -->\n"),
        ];

        let model = build(&config, &templates, &sources);
        assert_eq!(model.report.count(Kind::Config), 2);
        assert!(file(&model, "tags/rust/index.html").is_some());
        assert!(file(&model, "a/index.html").is_some());
        assert!(file(&model, "tags/list.html").is_none());
        assert!(model.files.iter().all(|f| f.path.components().all(|c| matches!(c, Component::Normal(_)))));
    }

    #[test]
    fn limits_and_custom_variables() {
        let mut config: Config = Toml::from_str(CONFIG).unwrap();
        let posts = &mut config.taxonomies[0].posts_indexes[0];
        posts.limit = Some(1);
        posts.order_by = "title".into();
        posts.order_direction = Direction::Asc;
        posts.custom_variables.insert("title".into(), "X {{ taxonomy_value }}".into());

        let values = &mut config.taxonomies[0].value_indexes[0];
        values.limit = Some(1);
        values.custom_variables.insert("heading".into(), "{{ taxonomy_values_count }} {{ title }}".into());

        let mut templates = templates();
        templates.insert(Protocol::Http, "tags-index", "{{ title }}<ul>{{ body }}</ul>");
        templates.insert(Protocol::Http, "tags-list", "<h1>{{ heading }}</h1>{{ body }}");

        let sources = [
            source("c.md", "<!-- title: C -->\n<!-- tags: T, Solo -->\n"),
            source("b.md", "<!-- title: B -->\n<!-- tags: T -->\n"),
        ];

        let model = build(&config, &templates, &sources);
        assert!(!model.report.has_failures(), "{}", model.report);
        assert_eq!(model.globals.get("tags_index_t"), Some("X T<ul><li>B</li></ul>"));
        assert_eq!(model.globals.get("tags_index_solo"), Some("X Solo<ul><li>C</li></ul>"));
        assert_eq!(file(&model, "tags/list.html"), Some("<h1>2 Tags</h1><h2>Solo (1)</h2>X Solo<ul><li>C</li></ul>"));
    }
}
