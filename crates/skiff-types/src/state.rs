//! Opaque serialized script values.
//!
//! Session history entries carry two script-visible state slots (the classic
//! `history.state` and the navigation API state). The engine never inspects
//! them — it only stores, copies, and hands them back. `SerializedState` is
//! that opaque blob: a structured-serialization of a JSON value (or the
//! distinguished `undefined`), postcard-encoded so the bytes are stable and
//! cheap to compare.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from encoding or decoding a serialized state blob.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state encoding failed: {0}")]
    Encode(#[from] postcard::Error),
    #[error("state payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The envelope actually encoded into the blob. JSON has no `undefined`,
/// so it gets its own arm; everything else is carried as rendered JSON text.
#[derive(Serialize, Deserialize)]
enum StoredState {
    Undefined,
    Json(String),
}

/// An opaque, structured-serialized script value.
///
/// Equality is byte equality of the encoding, which is what "the state did
/// not change" means to the engine.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedState(Vec<u8>);

impl SerializedState {
    /// Structured-serialize a JSON value.
    pub fn serialize(value: &serde_json::Value) -> Self {
        let stored = StoredState::Json(value.to_string());
        // Encoding a (tag, string) pair cannot fail.
        Self(postcard::to_stdvec(&stored).unwrap_or_default())
    }

    /// The serialization of `null` — the initial classic history API state.
    pub fn null() -> Self {
        Self::serialize(&serde_json::Value::Null)
    }

    /// The serialization of `undefined` — the initial navigation API state.
    pub fn undefined() -> Self {
        Self(postcard::to_stdvec(&StoredState::Undefined).unwrap_or_default())
    }

    /// Decode back to a script value. `Ok(None)` means `undefined`.
    pub fn to_value(&self) -> Result<Option<serde_json::Value>, StateError> {
        match postcard::from_bytes::<StoredState>(&self.0)? {
            StoredState::Undefined => Ok(None),
            StoredState::Json(text) => Ok(Some(serde_json::from_str(&text)?)),
        }
    }

    /// Whether this blob is the serialization of `undefined`.
    pub fn is_undefined(&self) -> bool {
        matches!(postcard::from_bytes::<StoredState>(&self.0), Ok(StoredState::Undefined))
    }

    /// The raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SerializedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match postcard::from_bytes::<StoredState>(&self.0) {
            Ok(StoredState::Undefined) => write!(f, "SerializedState(undefined)"),
            Ok(StoredState::Json(text)) => write!(f, "SerializedState({text})"),
            Err(_) => write!(f, "SerializedState(<{} bytes>)", self.0.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_roundtrip() {
        let state = SerializedState::null();
        assert_eq!(state.to_value().unwrap(), Some(serde_json::Value::Null));
        assert!(!state.is_undefined());
    }

    #[test]
    fn test_undefined_roundtrip() {
        let state = SerializedState::undefined();
        assert_eq!(state.to_value().unwrap(), None);
        assert!(state.is_undefined());
    }

    #[test]
    fn test_object_roundtrip() {
        let value = json!({"scroll": [0, 120], "form": {"q": "rust"}});
        let state = SerializedState::serialize(&value);
        assert_eq!(state.to_value().unwrap(), Some(value));
    }

    #[test]
    fn test_equality_is_byte_equality() {
        let a = SerializedState::serialize(&json!({"x": 1}));
        let b = SerializedState::serialize(&json!({"x": 1}));
        let c = SerializedState::serialize(&json!({"x": 2}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_null_and_undefined_differ() {
        assert_ne!(SerializedState::null(), SerializedState::undefined());
    }

    #[test]
    fn test_debug_shows_payload() {
        let state = SerializedState::serialize(&json!(7));
        assert_eq!(format!("{:?}", state), "SerializedState(7)");
        assert_eq!(
            format!("{:?}", SerializedState::undefined()),
            "SerializedState(undefined)"
        );
    }
}
