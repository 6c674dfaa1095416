//! Journal entries routed to plugins.

use std::ffi::CString;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A domain event passed to plugins unchanged.
///
/// The host never interprets the payload; it is serialized to JSON only when
/// crossing the C boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalEntry(Value);

impl JournalEntry {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The `event` field, if the payload has one. Used for log context only.
    pub fn event_name(&self) -> Option<&str> {
        self.0.get("event").and_then(Value::as_str)
    }

    /// JSON form handed to plugins.
    pub fn to_c_string(&self) -> Result<CString> {
        let json = serde_json::to_string(&self.0)?;
        Ok(CString::new(json)?)
    }
}

impl From<Value> for JournalEntry {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
