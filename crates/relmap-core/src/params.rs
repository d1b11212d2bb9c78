//! Sources of named statement parameters (`#{name}`).

use crate::model::Model;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// Something `#{name}` placeholders can be resolved against.
///
/// Implemented for string-keyed maps; `#[derive(Model)]` implements it for
/// records by Rust field name first and column name second.
pub trait ParamSource: Sync {
    fn param(&self, name: &str) -> Option<Value>;
}

impl ParamSource for HashMap<String, Value> {
    fn param(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl ParamSource for BTreeMap<String, Value> {
    fn param(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl ParamSource for HashMap<&str, Value> {
    fn param(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl ParamSource for [(&str, Value)] {
    fn param(&self, name: &str) -> Option<Value> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone())
    }
}

impl<const N: usize> ParamSource for [(&str, Value); N] {
    fn param(&self, name: &str) -> Option<Value> {
        self.as_slice().param(name)
    }
}

/// Look a parameter up on a record: by field name, then by column name.
pub fn model_param<M: Model>(record: &M, name: &str) -> Option<Value> {
    if let Some(value) = record.field_value(name) {
        return Some(value);
    }
    let descriptor = M::describe().ok()?;
    let field = descriptor.field_for_column(name)?;
    record.field_value(field.field_name)
}
