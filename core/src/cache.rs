use std::collections::HashMap;

use crate::checksum::{checksum, ChecksumIndex};
use crate::delta::Delta;
use crate::error::TextSyncError;
use crate::path::RelPath;

/// In-memory mirror of `path -> current content` that a peer believes the
/// other side holds. Entries exist only for tracked, readable, non-directory
/// files.
#[derive(Debug, Default)]
pub struct TextCache {
    entries: HashMap<RelPath, String>,
}

impl TextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &RelPath) -> Option<&String> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &RelPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Unconditional replacement.
    pub fn put(&mut self, path: RelPath, content: String) {
        self.entries.insert(path, content);
    }

    pub fn remove(&mut self, path: &RelPath) {
        self.entries.remove(path);
    }

    pub fn paths(&self) -> impl Iterator<Item = &RelPath> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materializes a CRC-64 per entry. Order is unspecified.
    pub fn snapshot(&self) -> ChecksumIndex {
        self.entries
            .iter()
            .map(|(path, content)| (path.clone(), checksum(content)))
            .collect()
    }

    /// Computes new content from the cached base plus `delta` and stores it
    /// atomically: on parse failure or base mismatch the entry is left
    /// untouched and `DeltaMismatch` is returned.
    pub fn apply(&mut self, path: &RelPath, delta: &Delta) -> Result<&str, TextSyncError> {
        let base = self.entries.get(path).map(String::as_str).unwrap_or("");
        let new_content = crate::delta::apply(base, delta)
            .map_err(|_| TextSyncError::DeltaMismatch(vec![path.to_string()]))?;
        self.entries.insert(path.clone(), new_content);
        Ok(self.entries.get(path).expect("just inserted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::diff;

    #[test]
    fn apply_updates_cache_on_success() {
        let mut cache = TextCache::new();
        let p = RelPath::new("a.txt").unwrap();
        cache.put(p.clone(), "hello".to_string());
        let delta = diff("hello", "hello world");
        cache.apply(&p, &delta).unwrap();
        assert_eq!(cache.get(&p).unwrap(), "hello world");
    }

    #[test]
    fn apply_leaves_cache_unchanged_on_mismatch() {
        let mut cache = TextCache::new();
        let p = RelPath::new("a.txt").unwrap();
        cache.put(p.clone(), "hello".to_string());
        let delta = diff("completely different base", "target");
        let err = cache.apply(&p, &delta).unwrap_err();
        assert!(matches!(err, TextSyncError::DeltaMismatch(_)));
        assert_eq!(cache.get(&p).unwrap(), "hello");
    }

    #[test]
    fn snapshot_contains_every_entry() {
        let mut cache = TextCache::new();
        cache.put(RelPath::new("a.txt").unwrap(), "x".to_string());
        cache.put(RelPath::new("b.txt").unwrap(), "y".to_string());
        let snap = cache.snapshot();
        assert_eq!(snap.len(), 2);
    }
}
