//! Result container produced by a single `load_data` call.
//!
//! Scalar variables map to an optional string (a statement that ran but found
//! no row still records its variables, with a null value). Sequence variables
//! map to the column values of every returned row, in row order. Names are
//! kept sorted, so serialized output is stable.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValuesStore {
    single_values: BTreeMap<String, Option<String>>,
    multi_values: BTreeMap<String, Vec<Option<String>>>,
}

impl ValuesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_single_value(&mut self, name: impl Into<String>, value: Option<String>) {
        self.single_values.insert(name.into(), value);
    }

    /// Creates an empty sequence for `name`. Calling it again keeps the
    /// values already appended.
    pub fn create_multiple_value(&mut self, name: impl Into<String>) {
        self.multi_values.entry(name.into()).or_default();
    }

    /// Appends to a sequence created by [`create_multiple_value`]. Does nothing
    /// for a name that was never created.
    ///
    /// [`create_multiple_value`]: ValuesStore::create_multiple_value
    pub fn append_to_multiple_value(&mut self, name: &str, value: Option<String>) {
        if let Some(values) = self.multi_values.get_mut(name) {
            values.push(value);
        }
    }

    /// Value of a scalar variable; `None` both for unknown names and for
    /// variables recorded as null.
    pub fn single_value(&self, name: &str) -> Option<&str> {
        self.single_values.get(name).and_then(|v| v.as_deref())
    }

    /// Values of a sequence variable; empty for unknown names.
    pub fn multiple_value(&self, name: &str) -> &[Option<String>] {
        self.multi_values
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Non-null values of a sequence variable, in row order.
    pub fn multiple_strings(&self, name: &str) -> Vec<String> {
        self.multiple_value(name).iter().flatten().cloned().collect()
    }

    pub fn contains_single(&self, name: &str) -> bool {
        self.single_values.contains_key(name)
    }

    pub fn contains_multiple(&self, name: &str) -> bool {
        self.multi_values.contains_key(name)
    }

    pub fn single_names(&self) -> impl Iterator<Item = &str> {
        self.single_values.keys().map(String::as_str)
    }

    pub fn multiple_names(&self) -> impl Iterator<Item = &str> {
        self.multi_values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.single_values.is_empty() && self.multi_values.is_empty()
    }

    /// Folds a fragment produced by one statement into this store.
    pub fn merge(&mut self, other: ValuesStore) {
        self.single_values.extend(other.single_values);
        self.multi_values.extend(other.multi_values);
    }

    /// Copy holding only the given variables.
    pub fn restricted_to<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> ValuesStore {
        let mut restricted = ValuesStore::new();
        for name in names {
            if let Some(value) = self.single_values.get(name) {
                restricted.add_single_value(name, value.clone());
            }
            if let Some(values) = self.multi_values.get(name) {
                restricted.multi_values.insert(name.to_string(), values.clone());
            }
        }
        restricted
    }
}
