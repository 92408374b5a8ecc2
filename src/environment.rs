use crate::scope::Scope;
use crate::value::Value;
use std::collections::HashMap;

/// Runtime bindings for the names of one scope.
///
/// The set of names is fixed when the environment is built; assignment only
/// ever updates an existing binding.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
}

impl Environment {
    /// Binds every name declared in `scope` to nil.
    pub fn from_scope(scope: &Scope) -> Self {
        let values = scope
            .names()
            .iter()
            .map(|name| (name.clone(), Value::Nil))
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Updates an existing binding. Returns false when `name` is not bound
    /// here.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copies every binding of `previous` whose name also exists here.
    /// Returns how many bindings were carried over.
    pub fn migrate_from(&mut self, previous: &Environment) -> usize {
        let mut carried = 0;
        for (name, value) in &previous.values {
            if let Some(slot) = self.values.get_mut(name) {
                *slot = value.clone();
                carried += 1;
            }
        }
        carried
    }
}
