//! Typed identifiers for navigables, browsing contexts, and documents.
//!
//! All UUID-backed ID types wrap UUIDv7 (time-ordered, globally unique).
//! They're opaque handles — the engine never looks inside — and display as
//! standard UUID text for logging. The `short()` form (first 8 hex chars)
//! is for human-facing output, never a lookup key.
//!
//! `NavigationApiKey` and `NavigationApiId` are the script-observable
//! identity pair of a session history entry: the key survives
//! replace-in-place, the id is unique per entry instance.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A navigable (frame) identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigableId(uuid::Uuid);

/// A browsing context identifier. Used only as a non-owning back-reference
/// from session history entries; the context itself lives elsewhere.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrowsingContextId(uuid::Uuid);

/// An opaque handle to a document owned by an external collaborator.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(uuid::Uuid);

/// Navigation API key: stable across replace-in-place operations.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationApiKey(uuid::Uuid);

/// Navigation API id: unique per session history entry instance.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationApiId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters — for human display only, not lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Full 32-character hex string (no hyphens).
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// The raw 16 bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Reconstruct from 16 bytes.
            pub fn from_bytes(b: [u8; 16]) -> Self {
                Self(uuid::Uuid::from_bytes(b))
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// A nil / zero ID — for sentinel values only.
            pub fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            /// Check if this is the nil ID.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(NavigableId, "NavigableId");
impl_typed_id!(BrowsingContextId, "BrowsingContextId");
impl_typed_id!(DocumentId, "DocumentId");
impl_typed_id!(NavigationApiKey, "NavigationApiKey");
impl_typed_id!(NavigationApiId, "NavigationApiId");

// ── DOM node handles ────────────────────────────────────────────────────────

/// A renderer-assigned node identifier, used to scope screenshot requests
/// to a single element. Plain integer handle; the renderer owns the mapping.
#[derive(
    Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DomNodeId(pub u64);

impl fmt::Display for DomNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

impl fmt::Debug for DomNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomNodeId({})", self.0)
    }
}

impl From<u64> for DomNodeId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unique() {
        let a = NavigableId::new();
        let b = NavigableId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_is_8_chars() {
        let id = DocumentId::new();
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_hex_is_32_chars() {
        let id = NavigationApiKey::new();
        assert_eq!(id.to_hex().len(), 32);
    }

    #[test]
    fn test_roundtrip_bytes() {
        let id = BrowsingContextId::new();
        let bytes = *id.as_bytes();
        assert_eq!(id, BrowsingContextId::from_bytes(bytes));
    }

    #[test]
    fn test_parse_both_formats() {
        let id = NavigableId::new();
        assert_eq!(NavigableId::parse(&id.to_hex()).unwrap(), id);
        assert_eq!(NavigableId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_nil() {
        assert!(DocumentId::nil().is_nil());
        assert!(!DocumentId::new().is_nil());
    }

    #[test]
    fn test_ordering_is_time_ordered() {
        let ids: Vec<NavigableId> = (0..10).map(|_| NavigableId::new()).collect();
        for i in 1..ids.len() {
            assert!(ids[i] >= ids[i - 1]);
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = NavigationApiId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: NavigationApiId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_postcard_roundtrip() {
        let id = NavigationApiKey::new();
        let bytes = postcard::to_stdvec(&id).unwrap();
        let parsed: NavigationApiKey = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_display_is_full_uuid_with_hyphens() {
        let displayed = NavigableId::new().to_string();
        assert_eq!(displayed.len(), 36);
        assert_eq!(displayed.chars().filter(|c| *c == '-').count(), 4);
    }

    #[test]
    fn test_debug_shows_type_and_short() {
        let id = DocumentId::new();
        let debug = format!("{:?}", id);
        assert!(debug.starts_with("DocumentId("));
        assert!(debug.ends_with(')'));
    }

    #[test]
    fn test_dom_node_id_display() {
        let id = DomNodeId(42);
        assert_eq!(id.to_string(), "node:42");
        assert_eq!(format!("{:?}", id), "DomNodeId(42)");
    }
}
