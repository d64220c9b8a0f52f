//! Opaque connection cursors
//!
//! A cursor is the base64 encoding of `arrayconnection:<key>`, where the key
//! is the position of an item in its backend (row id, slug, or a structured
//! composite).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

const CURSOR_PREFIX: &str = "arrayconnection:";

/// Backend position of an item, as carried by a cursor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey(String);

impl PositionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Integer view of the key, when it is one
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// JSON view of the key: a number for integer keys, a string otherwise
    pub fn to_value(&self) -> serde_json::Value {
        match self.as_i64() {
            Some(id) => serde_json::Value::from(id),
            None => serde_json::Value::String(self.0.clone()),
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for PositionKey {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for PositionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for PositionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Cursor encoding/decoding
pub struct CursorCodec;

impl CursorCodec {
    /// Encode a position key into an opaque cursor
    pub fn encode(key: &PositionKey) -> String {
        BASE64.encode(format!("{CURSOR_PREFIX}{}", key.as_str()))
    }

    /// Decode a cursor back into its position key
    pub fn decode(cursor: &str) -> crate::Result<PositionKey> {
        let bytes = BASE64
            .decode(cursor.as_bytes())
            .map_err(|e| crate::ConnectionError::MalformedCursor(e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| crate::ConnectionError::MalformedCursor(e.to_string()))?;
        text.strip_prefix(CURSOR_PREFIX)
            .map(PositionKey::new)
            .ok_or_else(|| {
                crate::ConnectionError::MalformedCursor(format!(
                    "expected `{CURSOR_PREFIX}` prefix in `{cursor}`"
                ))
            })
    }

    /// Decode an optional cursor argument. Empty strings count as absent.
    pub fn decode_optional(cursor: Option<&str>) -> crate::Result<Option<PositionKey>> {
        match cursor {
            None | Some("") => Ok(None),
            Some(cursor) => Self::decode(cursor).map(Some),
        }
    }

    /// Encode a structured key (e.g. timestamp + id) as JSON inside the cursor
    pub fn encode_structured<T: Serialize>(value: &T) -> crate::Result<String> {
        let json = serde_json::to_string(value)
            .map_err(|e| crate::ConnectionError::MalformedCursor(e.to_string()))?;
        Ok(Self::encode(&PositionKey::new(json)))
    }

    /// Decode a structured key
    pub fn decode_structured<T: for<'de> Deserialize<'de>>(cursor: &str) -> crate::Result<T> {
        let key = Self::decode(cursor)?;
        serde_json::from_str(key.as_str())
            .map_err(|e| crate::ConnectionError::MalformedCursor(e.to_string()))
    }
}
