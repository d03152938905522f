//! Layered variable lookup.
//!
//! A [`Context`] is a stack of [`Scope`]s, each tagged with the [`Layer`] it
//! belongs to. Lookups walk from the highest layer down and the first scope
//! that defines a name wins. Within one layer, scopes pushed later shadow
//! scopes pushed earlier.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Kind, Result};
use crate::header::Header;
use crate::value::Value;
use crate::artifact::VariableBinding;

pub type Vars = FxHashMap<Arc<str>, Value>;

/// Context layers, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Variables bound by earlier index computations.
    Generated,
    System,
    Config,
    Document,
    Taxonomy,
    Custom,
}

/// Anything that can answer a variable lookup.
pub trait Scope: Sync {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

impl Scope for Vars {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Scope for Header {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

#[derive(Clone, Default)]
pub struct Context<'a> {
    scopes: Vec<(Layer, &'a dyn Scope)>,
}

impl<'a> Context<'a> {
    pub fn new() -> Self {
        Context::default()
    }

    /// Adds `scope` at `layer`, above every scope already in that layer.
    pub fn push(&mut self, layer: Layer, scope: &'a dyn Scope) {
        let at = self.scopes.partition_point(|(l, _)| *l <= layer);
        self.scopes.insert(at, (layer, scope));
    }

    pub fn with(mut self, layer: Layer, scope: &'a dyn Scope) -> Self {
        self.push(layer, scope);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&'a Value> {
        self.resolve(name).map(|(_, value)| value)
    }

    /// Like [`Context::lookup()`], also returning the layer that answered.
    pub fn resolve(&self, name: &str) -> Option<(Layer, &'a Value)> {
        self.scopes.iter()
            .rev()
            .find_map(|&(layer, scope)| scope.lookup(name).map(|v| (layer, v)))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.scopes.iter().map(|(layer, _)| layer))
            .finish()
    }
}

/// Variables bound by index computations over one build.
///
/// Each name is bound at most once. The store is written by the assembler
/// between taxonomies and only read while a taxonomy is being computed.
#[derive(Debug, Default)]
pub struct Globals {
    vars: Vars,
}

impl Globals {
    pub fn bind(&mut self, binding: VariableBinding) -> Result<()> {
        if self.vars.contains_key(&binding.name) {
            return err!([Kind::ConfigReference] "generated variable is bound twice",
                "variable" => binding.name,
                "help" => "index ids and taxonomy values must produce distinct names",
            );
        }

        self.vars.insert(binding.name, Value::String(binding.value));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.vars.keys().map(|k| &**k)
    }
}

impl Scope for Globals {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}
