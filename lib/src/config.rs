//! Site configuration: global settings plus the ordered taxonomy list.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::context::Vars;
use crate::error::{Kind, Result};
use crate::header;
use crate::substitute::Unresolved;
use crate::value::Value;
use crate::vars;

pub const DEFAULT_TEMPLATE: &str = "page";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub ssl_enabled: bool,
    pub domain: String,
    pub base_path: String,
    pub author: Option<String>,
    pub subtitle: Option<String>,
    /// A chrono `strftime` string; enables the `formatted_date` variable.
    pub custom_date_format: Option<String>,
    pub default_template: String,
    pub page_views_file: Option<PathBuf>,
    pub unresolved: Unresolved,
    pub taxonomies: Vec<TaxonomyConfig>,
    /// Any other top-level entry, exposed as a config-layer variable.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaxonomyConfig {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Page template for documents in this taxonomy without a `template`.
    #[serde(default)]
    pub document_template: Option<String>,
    #[serde(default, alias = "indexes")]
    pub posts_indexes: Vec<PostsIndexConfig>,
    #[serde(default, alias = "value_lists")]
    pub value_indexes: Vec<ValueIndexConfig>,
}

/// A list of the documents sharing a taxonomy value (or of every document in
/// the taxonomy, for [`IndexScope::Taxonomy`]).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PostsIndexConfig {
    pub id: String,
    pub template: String,
    pub item_template: String,
    #[serde(default = "default_posts_order")]
    pub order_by: String,
    #[serde(default)]
    pub order_direction: Direction,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub scope: IndexScope,
    #[serde(flatten)]
    pub output: Output,
    #[serde(default)]
    pub custom_variables: BTreeMap<String, String>,
}

/// A list of the values of a taxonomy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValueIndexConfig {
    pub id: String,
    pub template: String,
    pub item_template: String,
    #[serde(default)]
    pub order_by: ValueOrder,
    #[serde(default = "default_value_direction")]
    pub order_direction: Direction,
    #[serde(default)]
    pub limit: Option<usize>,
    /// A per-value posts index of the same taxonomy to embed in each item
    /// as `taxonomy_value_posts_index`.
    #[serde(default)]
    pub inlined_index_id: Option<String>,
    #[serde(flatten)]
    pub output: Output,
    #[serde(default)]
    pub custom_variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Output {
    #[serde(default, rename = "output_type")]
    pub kind: OutputKind,
    /// File extension for `file` outputs; defaults to the protocol's suffix.
    #[serde(default, rename = "output_suffix")]
    pub suffix: Option<String>,
    /// Replaces the default `{taxonomy}/{value}/{index}.{suffix}` path. It may
    /// contain placeholders, resolved against the wrapper's context.
    #[serde(default, rename = "output_path")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    File,
    #[default]
    Variable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexScope {
    /// One index per taxonomy value.
    #[default]
    Value,
    /// One index over every document in the taxonomy.
    Taxonomy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueOrder {
    /// Alphabetical by normalized value.
    #[default]
    Name,
    /// By number of member documents.
    Count,
}

fn default_posts_order() -> String {
    header::DATE.into()
}

fn default_value_direction() -> Direction {
    Direction::Asc
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ssl_enabled: false,
            domain: String::new(),
            base_path: String::new(),
            author: None,
            subtitle: None,
            custom_date_format: None,
            default_template: DEFAULT_TEMPLATE.into(),
            page_views_file: None,
            unresolved: Unresolved::default(),
            taxonomies: vec![],
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Checks identifiers before anything is rendered: taxonomy ids must be
    /// unique and distinct from reserved header fields, index ids unique
    /// within their taxonomy, and extra entries must be scalars or lists.
    pub fn validate(&self) -> Result<()> {
        let reserved = [header::DATE, header::TITLE, header::TEMPLATE, header::DRAFT];
        let mut taxonomies = FxHashSet::default();
        for taxonomy in &self.taxonomies {
            let id = taxonomy.id.trim();
            if id.is_empty() || id.contains(char::is_whitespace) {
                return err!([Kind::Config] "invalid taxonomy id",
                    "id" => format!("{:?}", taxonomy.id),
                    "help" => "taxonomy ids are non-empty and contain no whitespace",
                );
            }

            if reserved.contains(&id) {
                return err!([Kind::Config] "taxonomy id is a reserved header field",
                    "id" => id,
                    "reserved" => reserved.join(", "),
                );
            }

            if !taxonomies.insert(id) {
                return err!([Kind::Config] "duplicate taxonomy id", "id" => id);
            }

            let mut indexes = FxHashSet::default();
            let ids = taxonomy.posts_indexes.iter().map(|i| &i.id)
                .chain(taxonomy.value_indexes.iter().map(|i| &i.id));

            for index in ids {
                if index.trim().is_empty() {
                    return err!([Kind::Config] "empty index id", "taxonomy" => id);
                }

                if !indexes.insert(index) {
                    return err!([Kind::Config] "duplicate index id",
                        "taxonomy" => id,
                        "index" => index,
                    );
                }
            }
        }

        for (key, value) in &self.extra {
            if let Value::Array(items) = value {
                if items.iter().any(|v| matches!(v, Value::Array(_))) {
                    return err!([Kind::Config] "nested lists aren't supported",
                        "entry" => key,
                    );
                }
            }
        }

        Ok(())
    }

    pub fn taxonomy(&self, id: &str) -> Option<&TaxonomyConfig> {
        self.taxonomies.iter().find(|t| t.id == id)
    }

    pub fn taxonomy_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.taxonomies.iter().map(|t| &*t.id)
    }

    /// The config context layer.
    pub fn variables(&self) -> Vars {
        let mut vars = vars! {
            "ssl_enabled" => self.ssl_enabled,
            "domain" => &*self.domain,
            "base_path" => &*self.base_path,
            "default_template" => &*self.default_template,
        };

        let optional = [
            ("author", &self.author),
            ("subtitle", &self.subtitle),
            ("custom_date_format", &self.custom_date_format),
        ];

        for (key, value) in optional {
            if let Some(value) = value {
                vars.insert(Arc::from(key), Value::from(&**value));
            }
        }

        for (key, value) in &self.extra {
            vars.insert(Arc::from(&**key), value.clone());
        }

        vars
    }
}

impl ValueIndexConfig {
    /// The posts index `inlined_index_id` names in `taxonomy`, if it exists
    /// and is computed per value.
    pub fn inlined_in<'t>(&self, taxonomy: &'t TaxonomyConfig) -> Option<Result<&'t PostsIndexConfig>> {
        let id = self.inlined_index_id.as_deref()?;
        let index = taxonomy.posts_indexes.iter().find(|i| i.id == id);
        Some(match index {
            Some(index) if index.scope == IndexScope::Value => Ok(index),
            Some(_) => err!([Kind::ConfigReference] "inlined index isn't computed per value",
                "taxonomy" => &taxonomy.id,
                "index" => &self.id,
                "inlined index" => id,
            ),
            None => err!([Kind::ConfigReference] "inlined index doesn't exist",
                "taxonomy" => &taxonomy.id,
                "index" => &self.id,
                "inlined index" => id,
                "help" => "`inlined_index_id` must name a posts index of the same taxonomy",
            ),
        })
    }
}
