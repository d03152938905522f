//! Markdown conversion for each output protocol.

mod gemini;
mod summary;

use pulldown_cmark::{html, Options, Parser};

use crate::error::Result;
use crate::protocol::Protocol;

pub use gemini::to_gemini;
pub use summary::summarize;

/// Converts a markdown document body into a protocol's markup.
pub trait Converter: Send + Sync {
    fn convert(&self, protocol: Protocol, markdown: &str) -> Result<String>;
}

/// The default [`Converter`]: HTML through `pulldown-cmark`, Gemini text by
/// walking the same event stream.
#[derive(Debug, Clone, Copy)]
pub struct Markdown {
    options: Options,
}

impl Markdown {
    pub fn new() -> Self {
        Markdown {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_HEADING_ATTRIBUTES,
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

impl Default for Markdown {
    fn default() -> Self {
        Markdown::new()
    }
}

impl Converter for Markdown {
    fn convert(&self, protocol: Protocol, markdown: &str) -> Result<String> {
        let parser = Parser::new_ext(markdown, self.options);
        let output = match protocol {
            Protocol::Http => {
                let mut output = String::with_capacity(markdown.len() * 3 / 2);
                html::push_html(&mut output, parser);
                output
            }
            Protocol::Gemini => to_gemini(parser),
        };

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_per_protocol() {
        let md = "# Title\n\nSome *text* with a [link](https://example.com).\n";
        let html = Markdown::new().convert(Protocol::Http, md).unwrap();
        assert_eq!(html, "<h1>Title</h1>\n<p>Some <em>text</em> with a \
            <a href=\"https://example.com\">link</a>.</p>\n");

        let gmi = Markdown::new().convert(Protocol::Gemini, md).unwrap();
        assert_eq!(gmi, "# Title\n\nSome text with a link.\n=> https://example.com link\n");
    }

    #[test]
    fn placeholders_survive_conversion() {
        let md = "Hello {{ name }}, see {{ tags_index }}.\n";
        let html = Markdown::new().convert(Protocol::Http, md).unwrap();
        assert!(html.contains("{{ name }}"));
        assert!(html.contains("{{ tags_index }}"));

        let gmi = Markdown::new().convert(Protocol::Gemini, md).unwrap();
        assert_eq!(gmi, "Hello {{ name }}, see {{ tags_index }}.\n");
    }
}
