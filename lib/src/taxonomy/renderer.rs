use std::sync::Arc;

use crate::context::{Context, Layer, Scope, Vars};
use crate::document::Document;
use crate::error::{Report, Result};
use crate::markdown::summarize;
use crate::protocol::Protocol;
use crate::substitute::Substitution;
use crate::template::TemplateStore;
use crate::vars;

/// What every render in one protocol's build shares: templates, the
/// substitution policy, the system and config layers, and the report.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    pub protocol: Protocol,
    pub templates: &'a TemplateStore,
    pub substitution: Substitution,
    pub system: &'a Vars,
    pub config: &'a Vars,
    pub report: &'a Report,
}

impl<'a> Renderer<'a> {
    /// A context holding `generated` (lowest first), then system and config.
    pub fn context<'s>(&self, generated: &[&'s dyn Scope]) -> Context<'s>
        where 'a: 's
    {
        let mut ctx = Context::new()
            .with(Layer::System, self.system)
            .with(Layer::Config, self.config);

        for &scope in generated {
            ctx.push(Layer::Generated, scope);
        }

        ctx
    }

    pub fn template(&self, name: &str) -> Result<Arc<str>> {
        self.templates.resolve(self.protocol, name)
    }

    pub fn fill(&self, template: &str, ctx: &Context<'_>, origin: &str) -> Result<String> {
        self.substitution.render(template, ctx, origin, self.report)
    }

    /// Substitutes `doc`'s body in `ctx`, returning the `body` and `summary`
    /// variables for the document layer.
    pub fn document_body(&self, doc: &Document, ctx: &Context<'_>) -> Result<Vars> {
        let origin = doc.source.display().to_string();
        let body = self.fill(&doc.body, ctx, &origin)?;
        let summary = summarize(self.protocol, &body);
        Ok(vars! { "body" => body, "summary" => summary })
    }
}
