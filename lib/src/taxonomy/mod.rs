//! Taxonomies: membership of documents in taxonomy values, and the posts and
//! value indexes computed over them.

mod membership;
mod renderer;
mod index;

pub use membership::*;
pub use renderer::*;
pub use index::*;
