#![doc = svgbobdoc::transform!(
//! Template merging, placeholder substitution, and taxonomy indexing for
//! static sites that publish over http and gemini.
//!
//! # Overview
//!
//! Stencil turns a set of source documents, a set of per-protocol templates,
//! and a site configuration into rendered files and generated variables. It
//! has no template language: templates are plain text with `{{ name }}`
//! placeholders, and a template named `child_parent` is spliced into the
//! `{{ body }}` of its parent.
//!
//! A build for one protocol proceeds as follows:
//!
//! ```svgbob
//!  +---------+      +-----------+      +-------------+
//!  | sources +----->| documents +--+-->| taxonomy #1 +--+
//!  +---------+      +-----------+  |   +-------------+  |
//!                                  |         ...        |   +---------+
//!                                  +-->| taxonomy #N +--+-->| globals |
//!                                  |   +-------------+      +----+----+
//!                                  |                             |
//!                                  |       +-------+             |
//!                                  +------>| pages |<------------+
//!                                          +-------+
//! ```
//!
//!   * **Documents** are parsed from sources: a header of `<!-- key: value -->`
//!     lines followed by a markdown (or protocol-native) body.
//!
//!   * **Taxonomies** are processed in configuration order. Each one groups
//!     documents by the values of one header field and renders its _posts
//!     indexes_ (lists of documents) and then its _value indexes_ (lists of
//!     values). Outputs become files or write-once global variables.
//!
//!   * **Pages** are rendered last, once every global variable exists.
//!
//! ## Variable lookup
//!
//! Placeholders resolve against a stack of context layers. Later layers win:
//!
//! 1. generated index variables
//! 2. system variables (`scheme`, `domain`, `current_year`, ...)
//! 3. configuration variables
//! 4. document header and derived fields
//! 5. taxonomy variables of the index being rendered
//! 6. custom variables of the index being rendered
//!
//! Substitution is a single pass: text that a placeholder expands to is
//! never scanned again.
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod value;
pub mod fstree;
pub mod protocol;
pub mod header;
pub mod document;
pub mod template;
pub mod context;
pub mod substitute;
pub mod config;
pub mod taxonomy;
pub mod artifact;
pub mod markdown;
pub mod page_views;
pub mod site;

pub use protocol::Protocol;
pub use site::{Site, SiteModel, SourceFile};

pub use rayon;
pub use tracing;

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use crate::context::Globals;
    use crate::error::Report;
    use crate::markdown::Markdown;
    use crate::template::TemplateStore;
    use crate::site::SiteModel;

    assert_impl_all!(TemplateStore: Send, Sync);
    assert_impl_all!(Report: Send, Sync);
    assert_impl_all!(Globals: Send, Sync);
    assert_impl_all!(Markdown: Send, Sync);
    assert_impl_all!(SiteModel: Send);
}
