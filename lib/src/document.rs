use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};

use crate::context::Vars;
use crate::error::{Kind, Report};
use crate::header::{self, Header};
use crate::page_views::PageViews;
use crate::protocol::Protocol;
use crate::util::join_url;
use crate::value::Value;

/// The date assigned to documents without a (valid) `date` header:
/// 1970-01-01.
pub fn epoch() -> NaiveDate {
    NaiveDate::default()
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Extensions converted from markdown for every protocol.
const MARKDOWN_EXTS: &[&str] = &["md", "markdown"];

/// Site-wide settings that shape a document's derived fields.
#[derive(Debug, Clone, Copy)]
pub struct Layout<'a> {
    pub protocol: Protocol,
    pub base_path: &'a str,
    pub date_format: Option<&'a str>,
    pub page_views: Option<&'a PageViews>,
}

/// A parsed, non-draft source document for one protocol.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source path relative to the content root. This is its identity.
    pub source: Arc<Path>,
    pub header: Header,
    /// The converted body, with its placeholders still in place.
    pub body: Arc<str>,
    pub date: NaiveDate,
    /// Output path relative to the protocol's output root.
    pub target: PathBuf,
    /// Header fields plus derived fields: the document context layer.
    pub vars: Vars,
}

impl Document {
    /// `true` if a source with extension `ext` produces output for `protocol`.
    pub fn is_eligible(ext: &str, protocol: Protocol) -> bool {
        MARKDOWN_EXTS.contains(&ext) || ext == protocol.suffix()
    }

    /// `true` if a source with extension `ext` is converted from markdown.
    pub fn is_markdown(ext: &str) -> bool {
        MARKDOWN_EXTS.contains(&ext)
    }

    /// Builds a document from its parsed header and converted body.
    ///
    /// An invalid `date` header is recorded in `report` as a warning and the
    /// document falls back to [`epoch()`].
    pub fn new(
        source: impl Into<Arc<Path>>,
        header: Header,
        body: impl Into<Arc<str>>,
        layout: &Layout<'_>,
        report: &Report,
    ) -> Document {
        let source = source.into();
        let body = body.into();
        let (file_name, file_ext) = split_file_name(&source);
        let date = parse_date(&source, &header, report);

        let mut dir_parts: Vec<&str> = source.parent()
            .into_iter()
            .flat_map(|p| p.iter())
            .filter_map(|c| c.to_str())
            .collect();

        let suffix = layout.protocol.suffix();
        let index_file = format!("index.{suffix}");
        if file_name != "index" {
            dir_parts.push(&file_name);
        }

        let target: PathBuf = dir_parts.iter().copied().chain([index_file.as_str()]).collect();
        let relative_dir_path = join_url(std::iter::once(layout.base_path).chain(dir_parts.iter().copied()));
        let relative_path = join_url([&*relative_dir_path, &*index_file]);

        let mut vars = Vars::default();
        for (key, value) in header.iter() {
            vars.insert(key.clone(), value.clone());
        }

        let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        vars.insert(header::DATE.into(), date.format(DATE_FORMAT).to_string().into());
        vars.insert("rfc3339_date".into(), Utc.from_utc_datetime(&naive).to_rfc3339().into());
        vars.insert("file_name".into(), file_name.clone().into());
        vars.insert("file_ext".into(), file_ext.into());
        if let Some(format) = layout.date_format {
            let mut formatted = String::new();
            match write!(formatted, "{}", date.format(format)) {
                Ok(()) => { vars.insert("formatted_date".into(), formatted.into()); }
                Err(_) => report.warn(error!([Kind::Config] "invalid custom date format",
                    "format" => format,
                    "document" => source.display(),
                )),
            }
        }

        if let Some(page_views) = layout.page_views {
            let views = page_views.get(&relative_dir_path);
            vars.insert("page_views".into(), views.map(Value::from).unwrap_or(Value::Null));
        }

        vars.insert("relative_dir_path".into(), relative_dir_path.into());
        vars.insert("relative_path".into(), relative_path.into());

        Document { source, header, body, date, target, vars }
    }

    /// The `template` header, if any.
    pub fn template(&self) -> Option<&str> {
        self.header.get(header::TEMPLATE).and_then(Value::as_str)
    }

    /// The document's variable `key` as text, for sorting.
    pub fn sort_key(&self, key: &str) -> String {
        self.vars.get(key).map(|v| v.to_string()).unwrap_or_default()
    }
}

/// `post.tpl.md` is (`post`, `md`).
fn split_file_name(path: &Path) -> (String, String) {
    let name = path.file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    let stem = name.split_once('.').map_or(&*name, |(stem, _)| stem);
    let ext = name.rsplit_once('.').map_or("", |(_, ext)| ext);
    (stem.to_string(), ext.to_string())
}

fn parse_date(source: &Path, header: &Header, report: &Report) -> NaiveDate {
    let Some(value) = header.get(header::DATE) else {
        return epoch();
    };

    let raw = value.to_string();
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(date) => date,
        Err(e) => {
            report.warn(error!([Kind::InvalidDateFormat] "invalid document date",
                "document" => source.display(),
                "date" => raw,
                "expected" => "YYYY-MM-DD",
                "cause" => e,
            ));

            epoch()
        }
    }
}
