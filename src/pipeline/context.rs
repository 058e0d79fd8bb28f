//! Per-run pipeline context and the read-only views handed to steps

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Accumulated step outputs for a single pipeline run.
///
/// Owned by exactly one run. Steps never see it directly: they receive a
/// [`ContextView`] restricted to the keys they declare.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineContext {
    values: BTreeMap<String, Value>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used when seeding a run
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Write a value, returning the previous one if the key was overwritten
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Project the declared keys into a read-only view.
    ///
    /// Returns the first missing key as the error so the runner can report it.
    pub fn view<S: AsRef<str>>(&self, keys: &[S]) -> Result<ContextView, String> {
        let mut values = BTreeMap::new();
        for key in keys {
            let key = key.as_ref();
            let value = self.values.get(key).ok_or_else(|| key.to_string())?;
            values.insert(key.to_string(), value.clone());
        }
        Ok(ContextView { values })
    }

    /// Whole context as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}

impl From<ContextView> for PipelineContext {
    fn from(view: ContextView) -> Self {
        Self {
            values: view.values,
        }
    }
}

/// Read-only projection of a [`PipelineContext`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextView {
    values: BTreeMap<String, Value>,
}

impl ContextView {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// String value for `key`, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
