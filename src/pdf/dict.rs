//! PDF dictionary implementation

use indexmap::IndexMap;

use crate::error::PDFResult;
use super::{DataType, ObjectId};

/// PDF dictionary object.
///
/// Keys are stored without their leading `/` and keep insertion order so a
/// parse/write cycle reproduces the same layout. A key may carry no value,
/// which is written as a bare `/Key`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<String, Option<DataType>>,
}

impl Dictionary {
    /// Create new dictionary
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Get value by key, `None` if the key is absent or has no value
    pub fn get(&self, key: &str) -> Option<&DataType> {
        self.entries.get(key).and_then(Option::as_ref)
    }

    /// Get mutable value by key
    pub fn get_mut(&mut self, key: &str) -> Option<&mut DataType> {
        self.entries.get_mut(key).and_then(Option::as_mut)
    }

    /// Check for key, with or without value
    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Set value, keeping the key's position if it already exists
    pub fn insert(&mut self, key: impl Into<String>, value: DataType) -> Option<DataType> {
        self.entries.insert(key.into(), Some(value)).flatten()
    }

    /// Set a key without value
    pub fn insert_null(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), None);
    }

    /// Remove a key. No error if the key doesn't exist
    pub fn remove(&mut self, key: &str) -> Option<DataType> {
        self.entries.shift_remove(key).flatten()
    }

    /// Replace the value of an existing key; absent keys are left alone
    pub fn replace(&mut self, key: &str, value: DataType) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => false,
        }
    }

    /// Drop a key and append it again with a new value
    pub fn reset(&mut self, key: &str, value: DataType) {
        self.entries.shift_remove(key);
        self.entries.insert(key.to_string(), Some(value));
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&DataType>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move all entries of `other` into this dictionary
    pub fn extend(&mut self, other: Dictionary) {
        self.entries.extend(other.entries);
    }

    /// Get integer value
    pub fn get_integer(&self, key: &str) -> Option<i32> {
        match self.get(key) {
            Some(DataType::Integer { value, .. }) => Some(*value),
            _ => None,
        }
    }

    /// Get name value, without its leading `/`
    pub fn get_name(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(DataType::Name(name)) => Some(name.strip_prefix('/').unwrap_or(name)),
            _ => None,
        }
    }

    /// Get reference value
    pub fn get_reference(&self, key: &str) -> Option<ObjectId> {
        match self.get(key) {
            Some(DataType::Reference(id)) => Some(*id),
            _ => None,
        }
    }

    /// Write dictionary to output
    pub fn write_to(&self, output: &mut Vec<u8>) -> PDFResult<()> {
        output.extend_from_slice(b"<<");
        for (key, value) in &self.entries {
            output.push(b'/');
            output.extend_from_slice(key.as_bytes());
            if let Some(value) = value {
                value.write_to(output)?;
            }
        }
        output.extend_from_slice(b">>\n");
        Ok(())
    }
}
