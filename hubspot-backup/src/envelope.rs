//! Decoding of HubSpot list responses.
//!
//! Every paginated endpoint answers with a JSON object. The records live either
//! under `"objects"` or under a key named after the endpoint, and continuation
//! is signalled through `has-more` plus an offset field whose name varies.

use crate::{BackupError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

const ITEMS_KEY: &str = "objects";
const HAS_MORE_KEY: &str = "has-more";

/// Which envelope field carries the next page's offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorField {
    /// `offset`
    Offset,
    /// `vid-offset` (contacts)
    VidOffset,
}

impl CursorField {
    pub fn key(&self) -> &'static str {
        match self {
            CursorField::Offset => "offset",
            CursorField::VidOffset => "vid-offset",
        }
    }
}

/// Typed view of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub items: Vec<Value>,
    /// `has-more` present and not literally `false`
    pub has_more: bool,
    pub offset: Option<u64>,
    pub vid_offset: Option<u64>,
}

impl Envelope {
    /// Parse a page body for `endpoint`. Fails only when the body is not a JSON object.
    pub fn parse(body: &[u8], endpoint: &str) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        match value {
            Value::Object(map) => Ok(Self::from_map(map, endpoint)),
            other => Err(BackupError::Envelope(format!(
                "expected a JSON object for {}, got {}",
                endpoint,
                kind(&other)
            ))),
        }
    }

    fn from_map(mut map: Map<String, Value>, endpoint: &str) -> Self {
        let items = match map.remove(ITEMS_KEY).filter(|v| !v.is_null()) {
            Some(found) => found,
            None => map.remove(endpoint).unwrap_or(Value::Null),
        };

        let items = match items {
            Value::Array(items) => items,
            _ => Vec::new(),
        };

        let has_more = match map.get(HAS_MORE_KEY) {
            None | Some(Value::Bool(false)) => false,
            Some(_) => true,
        };

        Self {
            items,
            has_more,
            offset: map.get(CursorField::Offset.key()).and_then(as_offset),
            vid_offset: map.get(CursorField::VidOffset.key()).and_then(as_offset),
        }
    }

    pub fn cursor(&self, field: CursorField) -> Option<u64> {
        match field {
            CursorField::Offset => self.offset,
            CursorField::VidOffset => self.vid_offset,
        }
    }
}

/// Body of a non-2xx response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub message: String,
}

impl ErrorEnvelope {
    /// Never fails: an undecodable error body yields the raw text as message.
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|_| Self {
            message: String::from_utf8_lossy(body).trim().to_string(),
        })
    }
}

fn as_offset(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
