use log::debug;
use std::sync::Arc;

use crate::factory::{CacheKey, RecordCache, RecordFactory, ResolveResult};
use crate::gedcom::{extract_type, extract_xref, parse_header};
use crate::model::{GedcomRecord, PendingOverlay, RecordKind, Tree};
use crate::store::{PendingChangeStore, RecordStore, Store};

/// Factory for one record type, reading from that type's dedicated table.
#[derive(Debug, Clone, Copy)]
pub struct TypedRecordFactory {
    kind: RecordKind,
}

impl TypedRecordFactory {
    pub fn new(kind: RecordKind) -> Self {
        Self { kind }
    }

    /// One factory per typed kind, in lookup order.
    pub fn chain() -> Vec<Box<dyn RecordFactory>> {
        RecordKind::TYPED
            .into_iter()
            .map(|kind| Box::new(Self::new(kind)) as Box<dyn RecordFactory>)
            .collect()
    }

    fn is_own_type(&self, gedcom: &str) -> bool {
        parse_header(gedcom)
            .map(|header| Some(header.tag) == self.kind.tag())
            .unwrap_or(false)
    }

    /// A record without a committed row here belongs to this factory when the
    /// version its pending changes started from has this type, or, for a
    /// pending creation, when the created version does.
    fn owns_overlay(&self, overlay: &PendingOverlay) -> bool {
        if overlay.old_gedcom.is_empty() {
            self.is_own_type(&overlay.new_gedcom)
        } else {
            self.is_own_type(&overlay.old_gedcom)
        }
    }
}

#[async_trait::async_trait]
impl RecordFactory for TypedRecordFactory {
    fn kind(&self) -> RecordKind {
        self.kind
    }

    async fn try_resolve(
        &self,
        store: &dyn Store,
        cache: &mut RecordCache,
        xref: &str,
        tree: &Arc<Tree>,
        gedcom: Option<&str>,
    ) -> ResolveResult<Option<Arc<GedcomRecord>>> {
        let key = CacheKey::typed(self.kind, xref, tree.id);
        if let Some(cached) = cache.get(&key) {
            return Ok(cached);
        }

        let base = match gedcom {
            Some(gedcom) => {
                if Some(extract_type(gedcom)?.as_str()) != self.kind.tag() {
                    return Ok(None);
                }
                Some(gedcom.to_string())
            }
            None => store.typed_gedcom(self.kind, xref, tree.id).await?,
        };

        let overlay = store.pending_overlay(xref, tree.id).await?;

        let record = match (base, overlay) {
            (Some(base), overlay) => {
                let canonical = extract_xref(&base, xref);
                Some(self.construct(&canonical, base, overlay.map(|o| o.new_gedcom), tree.clone()))
            }
            (None, Some(overlay)) if self.owns_overlay(&overlay) => {
                let source = if overlay.old_gedcom.is_empty() {
                    &overlay.new_gedcom
                } else {
                    &overlay.old_gedcom
                };
                let canonical = extract_xref(source, xref);
                Some(self.construct(&canonical, String::new(), Some(overlay.new_gedcom), tree.clone()))
            }
            _ => None,
        };

        debug!(
            "{:?} factory {} {}@{}",
            self.kind,
            if record.is_some() { "resolved" } else { "declined" },
            xref,
            tree.name
        );

        cache.put(key, record.clone());
        Ok(record)
    }

    fn construct(
        &self,
        xref: &str,
        gedcom: String,
        pending: Option<String>,
        tree: Arc<Tree>,
    ) -> Arc<GedcomRecord> {
        Arc::new(GedcomRecord::new(self.kind, xref, gedcom, pending, tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ResolveError;
    use crate::model::NewPendingChange;
    use crate::store::{MemoryStore, PendingChangeStore, RecordStore, TreeStore};

    async fn setup() -> (MemoryStore, Arc<Tree>) {
        let store = MemoryStore::new();
        let tree = Tree::new(1, "family1", "Family One");
        store.upsert_tree(tree.clone()).await.unwrap();
        (store, Arc::new(tree))
    }

    #[tokio::test]
    async fn test_resolves_own_table_only() {
        let (store, tree) = setup().await;
        store.save_record(1, "R1", "0 @R1@ REPO\n1 NAME Archive").await.unwrap();
        let mut cache = RecordCache::new();

        let repo = TypedRecordFactory::new(RecordKind::Repository);
        let found = repo.try_resolve(&store, &mut cache, "R1", &tree, None).await.unwrap().unwrap();
        assert_eq!(found.kind(), RecordKind::Repository);
        assert_eq!(found.full_name(), "Archive");

        let note = TypedRecordFactory::new(RecordKind::Note);
        assert!(note.try_resolve(&store, &mut cache, "R1", &tree, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_supplied_gedcom_of_other_type_declines() {
        let (store, tree) = setup().await;
        let mut cache = RecordCache::new();
        let family = TypedRecordFactory::new(RecordKind::Family);

        let declined = family
            .try_resolve(&store, &mut cache, "I1", &tree, Some("0 @I1@ INDI"))
            .await
            .unwrap();
        assert!(declined.is_none());

        let malformed = family.try_resolve(&store, &mut cache, "I1", &tree, Some("junk")).await;
        assert!(matches!(malformed, Err(ResolveError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_pending_only_record() {
        let (store, tree) = setup().await;
        store
            .add_pending_change(NewPendingChange {
                tree_id: 1,
                xref: "S9".to_string(),
                old_gedcom: String::new(),
                new_gedcom: "0 @S9@ SOUR\n1 TITL Census".to_string(),
                user_name: "editor".to_string(),
                real_name: None,
            })
            .await
            .unwrap();
        let mut cache = RecordCache::new();

        let individual = TypedRecordFactory::new(RecordKind::Individual);
        assert!(individual.try_resolve(&store, &mut cache, "S9", &tree, None).await.unwrap().is_none());

        let source = TypedRecordFactory::new(RecordKind::Source);
        let created = source.try_resolve(&store, &mut cache, "S9", &tree, None).await.unwrap().unwrap();
        assert!(created.is_pending_addition());
        assert_eq!(created.full_name(), "Census");
    }

    #[test]
    fn test_chain_order() {
        let kinds: Vec<RecordKind> = TypedRecordFactory::chain().iter().map(|f| f.kind()).collect();
        assert_eq!(kinds, RecordKind::TYPED.to_vec());
    }
}
