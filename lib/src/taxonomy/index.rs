use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::artifact::{FileArtifact, RenderedArtifact, VariableBinding};
use crate::config::{Direction, IndexScope, Output, OutputKind, PostsIndexConfig};
use crate::config::{TaxonomyConfig, ValueIndexConfig, ValueOrder};
use crate::context::{Context, Layer, Scope, Vars};
use crate::document::Document;
use crate::error::{Kind, Result, Chainable};
use crate::header;
use crate::taxonomy::{Membership, Renderer, TaxonomyValue};
use crate::value::Value;
use crate::vars;

/// Rendered posts indexes of one taxonomy, keyed by index id and normalized
/// value (`None` for taxonomy-wide indexes).
type PostsOutputs = FxHashMap<(Arc<str>, Option<Arc<str>>), Arc<str>>;

/// Everything one taxonomy produced, in computation order.
#[derive(Debug, Default)]
pub struct TaxonomyOutput {
    pub artifacts: Vec<RenderedArtifact>,
}

impl TaxonomyOutput {
    pub fn bindings(&self) -> impl Iterator<Item = &VariableBinding> + '_ {
        self.artifacts.iter().filter_map(RenderedArtifact::as_variable)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileArtifact> + '_ {
        self.artifacts.iter().filter_map(RenderedArtifact::as_file)
    }
}

/// One computed index before dispatch.
#[derive(Debug)]
struct Rendered {
    value: Option<Arc<str>>,
    content: String,
    path: Option<String>,
}

/// Computes the posts and value indexes of one taxonomy.
///
/// Every posts index, for every value, is computed before any value index,
/// so a value index can embed a posts index and reference its variables.
/// Failures are recorded in the renderer's report and skip only the index
/// (or, for per-value posts indexes, the value) that failed.
pub struct IndexBuilder<'a, 'd> {
    renderer: Renderer<'a>,
    taxonomy: &'a TaxonomyConfig,
    membership: &'a Membership<'d>,
    globals: &'a dyn Scope,
}

impl<'a, 'd> IndexBuilder<'a, 'd> {
    pub fn new(
        renderer: Renderer<'a>,
        taxonomy: &'a TaxonomyConfig,
        membership: &'a Membership<'d>,
        globals: &'a dyn Scope,
    ) -> Self {
        IndexBuilder { renderer, taxonomy, membership, globals }
    }

    pub fn build(&self) -> TaxonomyOutput {
        let mut output = TaxonomyOutput::default();
        let mut posts = PostsOutputs::default();
        for config in &self.taxonomy.posts_indexes {
            let index: Arc<str> = config.id.as_str().into();
            for rendered in self.posts_index(config) {
                let key = (index.clone(), rendered.value.clone());
                posts.insert(key, rendered.content.as_str().into());
                let artifact = self.dispatch(&config.id, &config.output, rendered);
                output.artifacts.extend(self.or_fail(artifact, &config.id));
            }
        }

        let local: Vars = output.bindings()
            .map(|b| (b.name.clone(), Value::String(b.value.clone())))
            .collect();

        for config in &self.taxonomy.value_indexes {
            if let Some(rendered) = self.value_index(config, &posts, &local) {
                let artifact = self.dispatch(&config.id, &config.output, rendered);
                output.artifacts.extend(self.or_fail(artifact, &config.id));
            }
        }

        output
    }

    fn posts_index(&self, config: &PostsIndexConfig) -> Vec<Rendered> {
        let origin = format!("{}/{}", self.taxonomy.id, config.id);
        let templates = self.templates(&config.template, &config.item_template, &origin);
        let Some((wrapper, item)) = self.or_fail(templates, &origin) else {
            return vec![];
        };

        let render = |value: Option<&TaxonomyValue<'d>>, members: &[&'d Document]| {
            let result = self.posts(config, (&*wrapper, &*item), value, members, &origin);
            let context = || match value {
                Some(value) => error!("failed to compute posts index",
                    "index" => &origin,
                    "value" => &value.display,
                ),
                None => error!("failed to compute posts index", "index" => &origin),
            };

            self.or_fail(result.chain_with(context), &origin)
        };

        match config.scope {
            IndexScope::Taxonomy => render(None, self.membership.documents()).into_iter().collect(),
            IndexScope::Value => self.membership.values()
                .par_iter()
                .filter_map(|value| render(Some(value), &value.members))
                .collect(),
        }
    }

    fn posts(
        &self,
        config: &PostsIndexConfig,
        (wrapper, item): (&str, &str),
        value: Option<&TaxonomyValue<'d>>,
        members: &[&'d Document],
        origin: &str,
    ) -> Result<Rendered> {
        let mut docs = members.to_vec();
        sort_documents(&mut docs, &config.order_by, config.order_direction);
        docs.truncate(config.limit.unwrap_or(usize::MAX));

        let base = self.renderer.context(&[self.globals]);
        let taxonomy = self.taxonomy_vars();
        let mut per_value = value.map(value_vars).unwrap_or_default();
        per_value.insert("taxonomy_value_posts_count".into(), members.len().into());

        let item_ctx = base.clone()
            .with(Layer::Taxonomy, &taxonomy)
            .with(Layer::Taxonomy, &per_value);

        let mut items = String::new();
        for doc in docs {
            let ctx = item_ctx.clone().with(Layer::Document, &doc.vars);
            let body = self.renderer.document_body(doc, &ctx)?;
            let ctx = ctx.with(Layer::Document, &body);
            items.push_str(&self.renderer.fill(item, &ctx, origin)?);
        }

        let title = match value {
            Some(value) if !value.display.is_empty() => {
                format!("{} {}", self.taxonomy.title, value.display)
            }
            _ => self.taxonomy.title.clone(),
        };

        let wrapper_vars = vars! { header::TITLE => title, "body" => items };
        let ctx = item_ctx.with(Layer::Taxonomy, &wrapper_vars);
        let (content, path) = self.wrap(wrapper, &config.custom_variables, &config.output, ctx, origin)?;
        let value = value.map(|v| v.normalized.clone());
        Ok(Rendered { value, content, path })
    }

    fn value_index(
        &self,
        config: &ValueIndexConfig,
        posts: &PostsOutputs,
        local: &Vars,
    ) -> Option<Rendered> {
        let origin = format!("{}/{}", self.taxonomy.id, config.id);
        let templates = self.templates(&config.template, &config.item_template, &origin);
        let (wrapper, item) = self.or_fail(templates, &origin)?;
        let inlined = match config.inlined_in(self.taxonomy) {
            Some(result) => Some(self.or_fail(result, &origin)?),
            None => None,
        };

        let mut values: Vec<&TaxonomyValue<'d>> = self.membership.values().iter().collect();
        sort_values(&mut values, config.order_by, config.order_direction);
        values.truncate(config.limit.unwrap_or(usize::MAX));

        let base = self.renderer.context(&[self.globals, local as &dyn Scope]);
        let taxonomy = self.taxonomy_vars();
        let mut items = String::new();
        for value in values {
            let mut vars = value_vars(value);
            vars.insert("taxonomy_value_posts_count".into(), value.members.len().into());
            if let Some(inlined) = inlined {
                let key = (Arc::from(inlined.id.as_str()), Some(value.normalized.clone()));
                let Some(embedded) = posts.get(&key) else {
                    let error = error!([Kind::ConfigReference] "inlined index has no output for value",
                        "index" => &origin,
                        "inlined index" => &inlined.id,
                        "value" => &value.display,
                    );

                    return self.or_fail(Err(error), &origin);
                };

                vars.insert("taxonomy_value_posts_index".into(), Value::String(embedded.clone()));
            }

            let ctx = base.clone()
                .with(Layer::Taxonomy, &taxonomy)
                .with(Layer::Taxonomy, &vars);

            let rendered = self.renderer.fill(&item, &ctx, &origin);
            items.push_str(&self.or_fail(rendered, &origin)?);
        }

        let wrapper_vars = vars! {
            header::TITLE => &*self.taxonomy.title,
            "body" => items,
            "taxonomy_values_count" => self.membership.len(),
        };

        let ctx = base
            .with(Layer::Taxonomy, &taxonomy)
            .with(Layer::Taxonomy, &wrapper_vars);

        let wrapped = self.wrap(&wrapper, &config.custom_variables, &config.output, ctx, &origin);
        let (content, path) = self.or_fail(wrapped, &origin)?;
        Some(Rendered { value: None, content, path })
    }

    /// Renders a wrapper template with the config's custom variables on top
    /// of `ctx`. Also resolves the `output_path` override, if any.
    fn wrap(
        &self,
        wrapper: &str,
        custom: &BTreeMap<String, String>,
        output: &Output,
        ctx: Context<'_>,
        origin: &str,
    ) -> Result<(String, Option<String>)> {
        let custom: Vars = custom.iter()
            .map(|(k, v)| Ok((Arc::from(k.as_str()), self.renderer.fill(v, &ctx, origin)?.into())))
            .collect::<Result<_>>()?;

        let ctx = ctx.with(Layer::Custom, &custom);
        let content = self.renderer.fill(wrapper, &ctx, origin)?;
        let path = match &output.path {
            Some(path) => Some(self.renderer.fill(path, &ctx, origin)?),
            None => None,
        };

        Ok((content, path))
    }

    fn templates(&self, wrapper: &str, item: &str, origin: &str) -> Result<(Arc<str>, Arc<str>)> {
        let resolve = |name: &str| self.renderer.template(name)
            .chain_with(|| error!([Kind::ConfigReference] "index references an unusable template",
                "index" => origin,
                "template" => name,
            ));

        Ok((resolve(wrapper)?, resolve(item)?))
    }

    fn dispatch(&self, index: &str, output: &Output, rendered: Rendered) -> Result<RenderedArtifact> {
        let taxonomy = &*self.taxonomy.id;
        let value = rendered.value.as_deref();
        match output.kind {
            OutputKind::Variable => {
                let name = variable_name(taxonomy, index, value);
                tracing::info!(variable = %name, "generated index variable");
                Ok(VariableBinding::new(name, rendered.content).into())
            }
            OutputKind::File => {
                let suffix = output.suffix.as_deref().unwrap_or(self.renderer.protocol.suffix());
                let path = match rendered.path {
                    Some(path) => PathBuf::from(path),
                    None if value.map_or(true, is_segment) => default_path(taxonomy, index, value, suffix),
                    None => return err!([Kind::Config] "taxonomy value can't be a path segment",
                        "index" => format!("{taxonomy}/{index}"),
                        "value" => value.unwrap_or_default(),
                    ),
                };

                let file = FileArtifact::new(&path, rendered.content);
                if !is_contained(&file.path) {
                    return err!([Kind::Config] "index output path leaves the output directory",
                        "index" => format!("{taxonomy}/{index}"),
                        "path" => path.display(),
                    );
                }

                tracing::info!(path = %file.path.display(), "generated {taxonomy} {index} index");
                Ok(file.into())
            }
        }
    }

    fn taxonomy_vars(&self) -> Vars {
        vars! {
            "taxonomy_id" => &*self.taxonomy.id,
            "taxonomy_title" => &*self.taxonomy.title,
        }
    }

    fn or_fail<T>(&self, result: Result<T>, origin: &str) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(index = origin, "skipping index output");
                self.renderer.report.record(e);
                None
            }
        }
    }
}

fn value_vars(value: &TaxonomyValue<'_>) -> Vars {
    vars! {
        "taxonomy_value" => &*value.display,
        "taxonomy_value_lower" => value.display.to_lowercase(),
        "taxonomy_value_normalized" => &*value.normalized,
    }
}

/// `{taxonomy}_{index}` or `{taxonomy}_{index}_{value}`. An empty value adds
/// no suffix.
pub fn variable_name(taxonomy: &str, index: &str, value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => format!("{taxonomy}_{index}_{value}"),
        _ => format!("{taxonomy}_{index}"),
    }
}

/// `{taxonomy}/{value}/{index}.{suffix}`, without the value segment when
/// there is no (or an empty) value.
pub fn default_path(taxonomy: &str, index: &str, value: Option<&str>, suffix: &str) -> PathBuf {
    let mut path = PathBuf::from(taxonomy);
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        path.push(value);
    }

    path.push(format!("{index}.{suffix}"));
    path
}

/// A single, ordinary path component: no separators, no `.` or `..`.
fn is_segment(value: &str) -> bool {
    !value.contains(['/', '\\']) && value != "." && value != ".."
}

/// `true` if `path` is non-empty and made only of ordinary components.
fn is_contained(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Stable sort by `key`: `date` compares parsed dates, anything else the
/// variable's text, case-sensitively.
pub fn sort_documents(docs: &mut [&Document], key: &str, direction: Direction) {
    let compare = |a: &Document, b: &Document| -> Ordering {
        match key {
            header::DATE => a.date.cmp(&b.date),
            _ => a.sort_key(key).cmp(&b.sort_key(key)),
        }
    };

    docs.sort_by(|a, b| apply(direction, compare(*a, *b)));
}

pub fn sort_values(values: &mut [&TaxonomyValue<'_>], order: ValueOrder, direction: Direction) {
    values.sort_by(|a, b| {
        let ordering = match order {
            ValueOrder::Name => a.normalized.cmp(&b.normalized),
            ValueOrder::Count => a.members.len().cmp(&b.members.len()),
        };

        apply(direction, ordering)
    });
}

fn apply(direction: Direction, ordering: Ordering) -> Ordering {
    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}
