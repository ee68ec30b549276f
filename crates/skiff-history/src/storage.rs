//! The storage shed.
//!
//! Per-traversable container for session-scoped storage, keyed by origin.
//! The shed's lifecycle is tied to the traversable — created with it,
//! destroyed with it — but the traversal logic itself never writes here;
//! only session-storage operations from content do, through the owner.

use std::collections::HashMap;

use url::Origin;

/// One origin's session storage: a flat string map with a byte quota.
#[derive(Clone, Debug, Default)]
pub struct StorageBucket {
    items: HashMap<String, String>,
}

impl StorageBucket {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.items.remove(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// All session storage under one traversable, keyed by origin.
#[derive(Debug, Default)]
pub struct StorageShed {
    buckets: HashMap<Origin, StorageBucket>,
}

impl StorageShed {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bucket for an origin, if any content has stored into it.
    pub fn bucket(&self, origin: &Origin) -> Option<&StorageBucket> {
        self.buckets.get(origin)
    }

    /// The bucket for an origin, created on first use.
    pub fn bucket_mut(&mut self, origin: &Origin) -> &mut StorageBucket {
        self.buckets.entry(origin.clone()).or_default()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Tear down all storage. Called from traversable destruction.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn origin(s: &str) -> Origin {
        Url::parse(s).unwrap().origin()
    }

    #[test]
    fn test_bucket_created_on_first_use() {
        let mut shed = StorageShed::new();
        let a = origin("https://a.test/");
        assert!(shed.bucket(&a).is_none());

        shed.bucket_mut(&a).set("k", "v");
        assert_eq!(shed.bucket(&a).unwrap().get("k"), Some("v"));
        assert_eq!(shed.bucket_count(), 1);
    }

    #[test]
    fn test_buckets_are_origin_scoped() {
        let mut shed = StorageShed::new();
        shed.bucket_mut(&origin("https://a.test/")).set("k", "a");
        shed.bucket_mut(&origin("https://b.test/")).set("k", "b");
        assert_eq!(shed.bucket(&origin("https://a.test/")).unwrap().get("k"), Some("a"));
        assert_eq!(shed.bucket(&origin("https://b.test/")).unwrap().get("k"), Some("b"));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut shed = StorageShed::new();
        shed.bucket_mut(&origin("https://a.test/")).set("k", "v");
        shed.clear();
        assert_eq!(shed.bucket_count(), 0);
    }

    #[test]
    fn test_bucket_remove() {
        let mut bucket = StorageBucket::default();
        bucket.set("k", "v");
        assert_eq!(bucket.remove("k"), Some("v".to_string()));
        assert!(bucket.is_empty());
    }
}
