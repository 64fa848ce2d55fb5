use crate::model::{GedcomRecord, RecordKind, TreeId, Xref};
use std::collections::HashMap;
use std::sync::Arc;

/// Which factory produced a cache entry. The generic dispatcher and each
/// typed factory memoize independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryKind {
    Typed(RecordKind),
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub factory: FactoryKind,
    pub xref: Xref,
    pub tree_id: TreeId,
}

impl CacheKey {
    pub fn typed(kind: RecordKind, xref: &str, tree_id: TreeId) -> Self {
        Self {
            factory: FactoryKind::Typed(kind),
            xref: xref.to_string(),
            tree_id,
        }
    }

    pub fn generic(xref: &str, tree_id: TreeId) -> Self {
        Self {
            factory: FactoryKind::Generic,
            xref: xref.to_string(),
            tree_id,
        }
    }
}

/// Request-scoped memo of resolved records. A cached `None` records that the
/// lookup found nothing.
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: HashMap<CacheKey, Option<Arc<GedcomRecord>>>,
    hits: usize,
    misses: usize,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outer `None` is a miss; `Some(None)` is a remembered absence.
    pub fn get(&mut self, key: &CacheKey) -> Option<Option<Arc<GedcomRecord>>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: CacheKey, record: Option<Arc<GedcomRecord>>) {
        self.entries.insert(key, record);
    }

    /// Drop every entry for one record, e.g. after its pending state changed.
    pub fn forget(&mut self, xref: &str, tree_id: TreeId) {
        self.entries
            .retain(|key, _| !(key.xref == xref && key.tree_id == tree_id));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tree;

    fn record(xref: &str) -> Arc<GedcomRecord> {
        Arc::new(GedcomRecord::new(
            RecordKind::Individual,
            xref,
            format!("0 @{xref}@ INDI"),
            None,
            Arc::new(Tree::new(1, "family1", "Family One")),
        ))
    }

    #[test]
    fn test_keys_do_not_collide() {
        let mut cache = RecordCache::new();
        cache.put(CacheKey::typed(RecordKind::Individual, "I1", 2), Some(record("I1")));
        cache.put(CacheKey::generic("I1", 2), None);

        assert!(cache.get(&CacheKey::typed(RecordKind::Individual, "I12", 0)).is_none());
        assert!(cache.get(&CacheKey::typed(RecordKind::Family, "I1", 2)).is_none());
        assert!(matches!(cache.get(&CacheKey::generic("I1", 2)), Some(None)));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_cached_record_identity() {
        let mut cache = RecordCache::new();
        let rec = record("I1");
        cache.put(CacheKey::typed(RecordKind::Individual, "I1", 1), Some(rec.clone()));

        let hit = cache
            .get(&CacheKey::typed(RecordKind::Individual, "I1", 1))
            .flatten()
            .unwrap();
        assert!(Arc::ptr_eq(&hit, &rec));
    }

    #[test]
    fn test_forget_drops_all_factories() {
        let mut cache = RecordCache::new();
        cache.put(CacheKey::typed(RecordKind::Individual, "I1", 1), Some(record("I1")));
        cache.put(CacheKey::generic("I1", 1), None);
        cache.put(CacheKey::generic("I1", 2), None);
        cache.put(CacheKey::generic("I2", 1), None);

        cache.forget("I1", 1);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
