//! Single-pass `{{ name }}` substitution.
//!
//! A placeholder is `{{`, optional whitespace, a name of one or more
//! characters that are neither whitespace nor braces, optional whitespace
//! and `}}`. Anything else between braces is literal text. Substituted values
//! are never scanned again, so a value that itself contains `{{ x }}` is
//! emitted verbatim.

use std::ops::Range;

use memchr::memmem;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Kind, Report, Result};

/// What to do with a placeholder no context layer defines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unresolved {
    /// Substitute the empty string and warn.
    #[default]
    Empty,
    /// Leave the placeholder in the output and warn.
    Keep,
    /// Fail the render.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Byte range of the whole `{{ ... }}` in the template.
    pub range: Range<usize>,
    pub name: &'a str,
}

/// Iterates over the placeholders in `template`, left to right.
pub fn placeholders(template: &str) -> Placeholders<'_> {
    Placeholders { template, pos: 0 }
}

pub struct Placeholders<'a> {
    template: &'a str,
    pos: usize,
}

impl<'a> Iterator for Placeholders<'a> {
    type Item = Placeholder<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.template.as_bytes();
        loop {
            let start = self.pos + memmem::find(&bytes[self.pos..], b"{{")?;
            let inner = start + 2;
            let Some(len) = memmem::find(&bytes[inner..], b"}}") else {
                self.pos = bytes.len();
                return None;
            };

            let end = inner + len + 2;
            let name = self.template[inner..inner + len].trim();
            if is_name(name) {
                self.pos = end;
                return Some(Placeholder { range: start..end, name });
            }

            self.pos = start + 1;
        }
    }
}

fn is_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c: char| c.is_whitespace() || c == '{' || c == '}')
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Substitution {
    policy: Unresolved,
}

impl Substitution {
    pub fn new(policy: Unresolved) -> Self {
        Substitution { policy }
    }

    /// Replaces every placeholder in `template` with its value in `ctx`.
    ///
    /// Unresolved names are handled per the configured [`Unresolved`]
    /// policy; warnings name `origin`, the thing being rendered.
    pub fn render(
        &self,
        template: &str,
        ctx: &Context<'_>,
        origin: &str,
        report: &Report,
    ) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut missing: Vec<&str> = vec![];
        let mut last = 0;

        for placeholder in placeholders(template) {
            out.push_str(&template[last..placeholder.range.start]);
            last = placeholder.range.end;

            match ctx.lookup(placeholder.name) {
                Some(value) => {
                    use std::fmt::Write;
                    let _ = write!(out, "{value}");
                }
                None => {
                    if self.policy == Unresolved::Keep {
                        out.push_str(&template[placeholder.range.clone()]);
                    }

                    if !missing.contains(&placeholder.name) {
                        missing.push(placeholder.name);
                    }
                }
            }
        }

        out.push_str(&template[last..]);
        if missing.is_empty() {
            return Ok(out);
        }

        let error = error!([Kind::UnresolvedVariable] "unresolved template variables",
            "variables" => missing.join(", "),
            "while rendering" => origin,
        );

        match self.policy {
            Unresolved::Fail => Err(error),
            Unresolved::Empty | Unresolved::Keep => {
                report.warn(error);
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Layer;
    use crate::vars;

    fn names(template: &str) -> Vec<&str> {
        placeholders(template).map(|p| p.name).collect()
    }

    #[test]
    fn placeholder_grammar() {
        assert_eq!(names("{{a}} {{ b }} {{\tc\n}}"), ["a", "b", "c"]);
        assert_eq!(names("{{ two words }} {{}} {{ }} {{ a}b }}"), Vec::<&str>::new());
        assert_eq!(names("{{{ x }}}"), ["x"]);
        assert_eq!(names("{{ a {{ b }}"), ["b"]);
        assert_eq!(names("{{ unclosed"), Vec::<&str>::new());
        assert_eq!(names("{{ tags_index_café }}"), ["tags_index_café"]);
    }

    #[test]
    fn substitutes_in_a_single_pass() {
        let vars = vars!["name" => "{{ other }}", "other" => "nope", "n" => 3];
        let ctx = Context::new().with(Layer::Config, &vars);
        let report = Report::new();

        let out = Substitution::default()
            .render("<{{ name }}|{{n}}|{ {not} }>", &ctx, "test", &report)
            .unwrap();

        assert_eq!(out, "<{{ other }}|3|{ {not} }>");
        assert_eq!(report.diagnostics().count(), 0);
    }

    #[test]
    fn unresolved_policies() {
        let ctx = Context::new();
        let report = Report::new();
        let template = "a{{ missing }}b{{ missing }}";

        let out = Substitution::new(Unresolved::Empty).render(template, &ctx, "t", &report);
        assert_eq!(out.unwrap(), "ab");
        assert_eq!(report.count(Kind::UnresolvedVariable), 1);

        let out = Substitution::new(Unresolved::Keep).render(template, &ctx, "t", &report);
        assert_eq!(out.unwrap(), template);
        assert_eq!(report.count(Kind::UnresolvedVariable), 2);

        let error = Substitution::new(Unresolved::Fail)
            .render(template, &ctx, "t", &report)
            .unwrap_err();

        assert_eq!(error.kind(), Kind::UnresolvedVariable);
        assert_eq!(error.param("variables").as_deref(), Some("missing"));
        assert!(!report.has_failures());
    }
}
