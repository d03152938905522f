use pulldown_cmark::{Event, HeadingLevel, Tag, TagEnd};

/// Renders markdown events as Gemini text.
///
/// Gemini has no inline markup: emphasis is dropped, and links and images
/// are listed as `=> url label` lines after the block they appear in.
/// Headings deeper than three levels are clamped to `###`.
pub fn to_gemini<'a, I: Iterator<Item = Event<'a>>>(events: I) -> String {
    let mut writer = Writer::default();
    events.for_each(|event| writer.event(event));
    writer.finish()
}

#[derive(Debug, Default)]
struct Writer {
    out: String,
    line: String,
    block: Vec<String>,
    links: Vec<String>,
    open_links: Vec<(String, usize)>,
    lists: usize,
    quotes: usize,
}

impl Writer {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { .. }) => self.end_line(),
            Event::End(TagEnd::Heading(level)) => {
                let hashes = match level {
                    HeadingLevel::H1 => "#",
                    HeadingLevel::H2 => "##",
                    _ => "###",
                };

                self.line = format!("{hashes} {}", self.line.trim());
                self.end_line();
                self.flush_block();
            }
            Event::End(TagEnd::Paragraph) if self.lists > 0 => self.line.push(' '),
            Event::End(TagEnd::Paragraph) => {
                self.end_line();
                self.flush_block();
            }
            Event::Start(Tag::BlockQuote) => {
                self.end_line();
                self.flush_block();
                self.quotes += 1;
            }
            Event::End(TagEnd::BlockQuote) => {
                self.end_line();
                self.flush_block();
                self.quotes = self.quotes.saturating_sub(1);
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.end_line();
                self.flush_block();
            }
            Event::End(TagEnd::CodeBlock) => {
                let code = std::mem::take(&mut self.line);
                self.block.push("```".into());
                self.block.extend(code.trim_end_matches('\n').split('\n').map(String::from));
                self.block.push("```".into());
                self.flush_block();
            }
            Event::Start(Tag::List(_)) => {
                self.end_item();
                self.lists += 1;
            }
            Event::End(TagEnd::List(_)) => {
                self.lists = self.lists.saturating_sub(1);
                if self.lists == 0 {
                    self.flush_block();
                }
            }
            Event::Start(Tag::Item) | Event::End(TagEnd::Item) => self.end_item(),
            Event::Start(Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. }) => {
                self.open_links.push((dest_url.to_string(), self.line.len()));
            }
            Event::End(TagEnd::Link | TagEnd::Image) => {
                if let Some((url, start)) = self.open_links.pop() {
                    let label = self.line.get(start..).unwrap_or_default().trim();
                    match label.is_empty() {
                        true => self.links.push(format!("=> {url}")),
                        false => self.links.push(format!("=> {url} {label}")),
                    }
                }
            }
            Event::Start(Tag::FootnoteDefinition(label)) => {
                self.end_line();
                self.flush_block();
                self.line.push_str(&format!("[{label}]: "));
            }
            Event::End(TagEnd::TableCell) => self.line.push_str(" | "),
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                let row = self.line.trim().trim_end_matches('|').trim_end().to_string();
                self.block.push(row);
                self.line.clear();
            }
            Event::End(TagEnd::Table | TagEnd::HtmlBlock) => {
                self.end_line();
                self.flush_block();
            }
            Event::Text(text) | Event::Code(text) | Event::Html(text) | Event::InlineHtml(text) => {
                self.line.push_str(&text);
            }
            Event::FootnoteReference(label) => self.line.push_str(&format!("[{label}]")),
            Event::TaskListMarker(done) => self.line.push_str(if done { "[x] " } else { "[ ] " }),
            Event::SoftBreak => self.line.push(' '),
            Event::HardBreak => self.end_line(),
            Event::Rule => {
                self.end_line();
                self.flush_block();
                self.block.push("---".into());
                self.flush_block();
            }
            _ => {}
        }
    }

    /// Moves the text of the line being built into the current block.
    fn end_line(&mut self) {
        for line in self.line.split('\n') {
            let line = line.trim();
            if !line.is_empty() {
                self.block.push(line.to_string());
            }
        }

        self.line.clear();
    }

    fn end_item(&mut self) {
        let item = self.line.trim();
        if !item.is_empty() {
            self.block.push(format!("* {item}"));
        }

        self.line.clear();
    }

    /// Writes the current block and its links, separated from the previous
    /// block by an empty line.
    fn flush_block(&mut self) {
        if self.block.is_empty() && self.links.is_empty() {
            return;
        }

        if !self.out.is_empty() {
            self.out.push('\n');
        }

        let prefix = if self.quotes > 0 { "> " } else { "" };
        for line in self.block.drain(..) {
            self.out.push_str(prefix);
            self.out.push_str(&line);
            self.out.push('\n');
        }

        for link in self.links.drain(..) {
            self.out.push_str(&link);
            self.out.push('\n');
        }
    }

    fn finish(mut self) -> String {
        self.end_line();
        self.flush_block();
        self.out
    }
}

#[cfg(test)]
mod tests {
    use pulldown_cmark::{Options, Parser};

    use super::to_gemini;

    fn gmi(markdown: &str) -> String {
        to_gemini(Parser::new_ext(markdown, Options::ENABLE_TABLES))
    }

    #[test]
    fn blocks() {
        let md = "## Intro\n\n#### Deep\n\n> quoted\n> text\n\n```rust\nfn main() {}\n```\n\n---\n";
        assert_eq!(gmi(md), "## Intro\n\n### Deep\n\n> quoted text\n\n```\nfn main() {}\n```\n\n---\n");
    }

    #[test]
    fn lists_and_links() {
        let md = "* one [a](/a)\n* two\n  * nested ![img](/i.png)\n\nafter\n";
        assert_eq!(gmi(md), "* one a\n* two\n* nested img\n=> /a a\n=> /i.png img\n\nafter\n");
    }

    #[test]
    fn tables() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        assert_eq!(gmi(md), "a | b\n1 | 2\n");
    }
}
