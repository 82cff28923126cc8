//! Solutions of a SELECT query and their materialization.

use crate::term::RdfTerm;
use floe_common::{Column, Result};
use floe_connector::{RowMaterializer, Value};

/// One solution: variable names (without `?`) and their bound terms.
/// Unbound variables are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    bindings: Vec<(String, RdfTerm)>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, variable: impl Into<String>, term: RdfTerm) -> Self {
        self.bindings.push((variable.into(), term));
        self
    }

    pub fn get(&self, variable: &str) -> Option<&RdfTerm> {
        self.bindings.iter().find(|(name, _)| name == variable).map(|(_, term)| term)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BindingMaterializer;

impl RowMaterializer for BindingMaterializer {
    type Record = BindingSet;

    fn record_keys<'r>(&self, record: &'r BindingSet) -> Vec<&'r str> {
        record.variables().collect()
    }

    fn extract_key(&self, record: &BindingSet, key: &str, column: &Column) -> Result<Option<Value>> {
        match record.get(key) {
            Some(term) => term.to_value(column),
            None => Ok(None),
        }
    }
}
