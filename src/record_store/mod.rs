//! Record store facade over the remote trackor API.
//!
//! The remote system stores "trackors": records addressed by an integer id
//! (`TRACKOR_ID`) and a string key (`TRACKOR_KEY`) that carry a dynamic set of
//! named fields. This module types that data:
//!
//! - [`FieldValue`] is the tagged union of field shapes the job reads and
//!   writes: plain text or a file attachment.
//! - [`Record`] is one row of a read result.
//! - [`FieldFilter`] and [`SearchTrigger`] are the two ways to select rows.
//! - [`UpdatePayload`] is a partial update: only listed fields are touched.
//!
//! Calls go through a [`RecordSession`](session::RecordSession) bound to one
//! trackor type. [`RecordStore`](client::RecordStore) wraps a session and turns
//! the remote error list into typed errors.

pub mod client;
pub mod http;
pub mod mock;
pub mod session;

pub use client::RecordStore;
pub use http::{HttpSession, HttpSessionFactory};
pub use mock::{InMemoryBackend, InMemorySession, RecordedUpdate};
pub use session::{
    ReadRequest, RecordSession, RemoteReply, Selection, SessionFactory, UpdateTarget,
};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordStoreError;

/// Name of the id column in every read result.
pub const TRACKOR_ID: &str = "TRACKOR_ID";

/// Name of the key column in every read result.
pub const TRACKOR_KEY: &str = "TRACKOR_KEY";

/// Connection settings for the remote system, normalized once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessParameters {
    url: String,
    access_key: String,
    secret_key: String,
}

impl AccessParameters {
    /// Strip any leading `http://` or `https://` from `url`, plus trailing
    /// slashes.
    pub fn new(url: &str, access_key: &str, secret_key: &str) -> Self {
        let trimmed = url.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        Self {
            url: without_scheme.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Host (and optional path prefix) without scheme.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// API access key.
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Token credential: `<access_key>:<secret_key>`.
    pub(crate) fn token(&self) -> String {
        format!("{}:{}", self.access_key, self.secret_key)
    }
}

impl fmt::Debug for AccessParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessParameters")
            .field("url", &self.url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// A file-valued field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    /// File name shown in the remote UI
    pub file_name: String,
    /// Base64 file contents
    pub data: String,
}

/// Value of a named field.
///
/// Serializes untagged: text as a JSON string, attachments as
/// `{"file_name": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// File attachment
    File(FileAttachment),
    /// Scalar text
    Text(String),
}

impl FieldValue {
    /// Text content, or `None` for attachments.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::File(_) => None,
        }
    }

    /// Convert a JSON field from a read result.
    ///
    /// Numbers and booleans become text; `null` has no value.
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => Some(Self::Text(n.to_string())),
            Value::Bool(b) => Some(Self::Text(if *b { "1" } else { "0" }.to_string())),
            Value::Object(_) => match serde_json::from_value::<FileAttachment>(value.clone()) {
                Ok(file) => Some(Self::File(file)),
                Err(_) => Some(Self::Text(value.to_string())),
            },
            Value::Array(_) => Some(Self::Text(value.to_string())),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<FileAttachment> for FieldValue {
    fn from(file: FileAttachment) -> Self {
        Self::File(file)
    }
}

/// Exact-match selection: every listed field must equal its value.
pub type FieldFilter = BTreeMap<String, String>;

/// Partial update: only listed fields are written.
pub type UpdatePayload = BTreeMap<String, FieldValue>;

/// Server-side search expression `equal(FIELD, VALUE)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTrigger {
    field: String,
    value: String,
}

impl SearchTrigger {
    /// `equal(field, value)`
    pub fn equal(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Field being compared.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Required value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for SearchTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "equal({}, {})", self.field, self.value)
    }
}

/// One trackor from a read or update result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// `TRACKOR_ID`
    pub id: i64,
    /// `TRACKOR_KEY`
    pub key: String,
    /// Remaining projected fields
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Record with no extra fields.
    pub fn new(id: i64, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Text of a field; `TRACKOR_KEY` resolves to the key.
    pub fn text(&self, name: &str) -> Option<&str> {
        if name == TRACKOR_KEY {
            return Some(&self.key);
        }
        self.fields.get(name).and_then(FieldValue::as_text)
    }

    /// Any field value; `TRACKOR_KEY` is not included.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Parse one JSON row.
    pub fn from_json(row: &Value) -> Result<Self, RecordStoreError> {
        let object = row
            .as_object()
            .ok_or_else(|| RecordStoreError::Decode(format!("expected an object, got {row}")))?;

        let id = match object.get(TRACKOR_ID) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| RecordStoreError::Decode(format!("row without integer {TRACKOR_ID}")))?;

        let key = match object.get(TRACKOR_KEY) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let fields = object
            .iter()
            .filter(|(name, _)| name.as_str() != TRACKOR_ID && name.as_str() != TRACKOR_KEY)
            .filter_map(|(name, value)| FieldValue::from_json(value).map(|v| (name.clone(), v)))
            .collect();

        Ok(Self { id, key, fields })
    }

    /// Parse a read result: an array of rows, `null` meaning no rows.
    pub fn list_from_json(data: &Value) -> Result<Vec<Self>, RecordStoreError> {
        match data {
            Value::Null => Ok(Vec::new()),
            Value::Array(rows) => rows.iter().map(Self::from_json).collect(),
            other => Err(RecordStoreError::Decode(format!(
                "expected an array of trackors, got {other}"
            ))),
        }
    }

    /// JSON row restricted to `fields` (id and key always included).
    pub fn project(&self, fields: &[String]) -> Value {
        let mut row = Map::new();
        row.insert(TRACKOR_ID.to_string(), Value::from(self.id));
        row.insert(TRACKOR_KEY.to_string(), Value::from(self.key.clone()));
        for name in fields {
            if name == TRACKOR_ID || name == TRACKOR_KEY {
                continue;
            }
            let value = self
                .fields
                .get(name)
                .and_then(|v| serde_json::to_value(v).ok())
                .unwrap_or(Value::Null);
            row.insert(name.clone(), value);
        }
        Value::Object(row)
    }
}
