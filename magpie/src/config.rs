use stencil::error;
use stencil::config::Config;
use stencil::error::{Chainable, Kind, Report, Result};
use stencil::fstree::FsTree;
use stencil::page_views::PageViews;
use stencil::value::{Format, Json, Source, Toml};

use crate::CONFIG_FILES;

/// Reads and validates the project's `config.toml`, or `config.json` when
/// there is no TOML file. A project without either uses the defaults.
pub fn discover(tree: &FsTree) -> Result<Config> {
    let entry = CONFIG_FILES.iter().find_map(|name| tree.get(None, name));
    let config: Config = match entry {
        Some(entry) if entry.file_ext() == Some("json") => Json::read(entry),
        Some(entry) => Toml::read(entry),
        None => {
            tracing::warn!(root = %tree.root().path.display(), "no config file; using defaults");
            return Ok(Config::default());
        }
    }.chain_with(|| error!([Kind::Config] "failed to read configuration"))?;

    config.validate().chain_with(|| error!("invalid configuration"))?;
    Ok(config)
}

/// Reads the page views file named by `config`, relative to the project root.
pub fn page_views(tree: &FsTree, config: &Config, report: &Report) -> Result<Option<PageViews>> {
    let Some(path) = &config.page_views_file else {
        return Ok(None);
    };

    let path = tree.root().path.join(path);
    let text = path.as_path().read_text()
        .chain_with(|| error!([Kind::Config] "failed to read page views",
            "path" => path.display(),
        ))?;

    let page_views = PageViews::parse(&text, report);
    tracing::info!(entries = page_views.len(), "loaded page views");
    Ok(Some(page_views))
}
