//! # Transport Payload
//!
//! A flat, insertion-ordered key/value container used on both sides of the
//! launch boundary. Any host IPC mechanism can carry it; the JSON form is
//! provided for hosts that exchange text.
//!
//! ```rust
//! use lenskit::Payload;
//!
//! let mut payload = Payload::new();
//! payload.put_bool("focus_enabled", false);
//! payload.put_strings("lens_group_ids", ["G1"]);
//!
//! assert_eq!(payload.get_bool("focus_enabled").unwrap(), Some(false));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LensKitError, Result};

/// A single value stored in a [`Payload`] slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PayloadValue {
    Bool(bool),
    Int(i64),
    String(String),
    Strings(Vec<String>),
    Nested(Payload),
}

impl PayloadValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::Strings(_) => "string list",
            Self::Nested(_) => "nested payload",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Slot {
    key: String,
    value: PayloadValue,
}

/// Ordered key/value payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    slots: Vec<Slot>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a slot. A replaced slot keeps its original position.
    pub fn put(&mut self, key: impl Into<String>, value: PayloadValue) {
        let key = key.into();
        match self.slots.iter_mut().find(|slot| slot.key == key) {
            Some(slot) => slot.value = value,
            None => self.slots.push(Slot { key, value }),
        }
    }

    pub fn put_bool(&mut self, key: impl Into<String>, value: bool) {
        self.put(key, PayloadValue::Bool(value));
    }

    pub fn put_int(&mut self, key: impl Into<String>, value: i64) {
        self.put(key, PayloadValue::Int(value));
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.put(key, PayloadValue::String(value.into()));
    }

    /// Insert a string slot only when `value` is set.
    pub fn put_optional_string(&mut self, key: impl Into<String>, value: Option<&str>) {
        if let Some(value) = value {
            self.put_string(key, value);
        }
    }

    pub fn put_strings<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.put(key, PayloadValue::Strings(values));
    }

    pub fn put_nested(&mut self, key: impl Into<String>, value: Payload) {
        self.put(key, PayloadValue::Nested(value));
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.slots
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| &slot.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<PayloadValue> {
        let index = self.slots.iter().position(|slot| slot.key == key)?;
        Some(self.slots.remove(index).value)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over slots in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> {
        self.slots.iter().map(|slot| (slot.key.as_str(), &slot.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.key.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(PayloadValue::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(mismatch(key, "bool", other)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(PayloadValue::Int(value)) => Ok(Some(*value)),
            Some(other) => Err(mismatch(key, "int", other)),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(PayloadValue::String(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(mismatch(key, "string", other)),
        }
    }

    pub fn get_strings(&self, key: &str) -> Result<Option<&[String]>> {
        match self.get(key) {
            None => Ok(None),
            Some(PayloadValue::Strings(values)) => Ok(Some(values.as_slice())),
            Some(other) => Err(mismatch(key, "string list", other)),
        }
    }

    pub fn get_nested(&self, key: &str) -> Result<Option<&Payload>> {
        match self.get(key) {
            None => Ok(None),
            Some(PayloadValue::Nested(value)) => Ok(Some(value)),
            Some(other) => Err(mismatch(key, "nested payload", other)),
        }
    }

    /// Serialize to the portable JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the portable JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn mismatch(key: &str, expected: &str, actual: &PayloadValue) -> LensKitError {
    LensKitError::invalid_slot(
        key,
        format!("expected {}, found {}", expected, actual.type_name()),
    )
}
