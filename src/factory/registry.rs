use anyhow::anyhow;
use log::debug;
use std::sync::Arc;

use crate::factory::{
    CacheKey, RecordCache, RecordFactory, ResolveError, ResolveResult, TypedRecordFactory,
};
use crate::gedcom::parse_header;
use crate::model::{GedcomRecord, RecordKind, RecordRow, Tree, TreeId};
use crate::store::{PendingChangeStore, RecordStore, Store};

/// The factory chain plus its cache, built fresh for every request.
pub struct Factories<S: Store + 'static> {
    store: Arc<S>,
    chain: Vec<Box<dyn RecordFactory>>,
    cache: RecordCache,
}

impl<S: Store + 'static> Factories<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            chain: TypedRecordFactory::chain(),
            cache: RecordCache::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    fn factory(&self, kind: RecordKind) -> Option<&dyn RecordFactory> {
        self.chain
            .iter()
            .find(|factory| factory.kind() == kind)
            .map(|factory| factory.as_ref())
    }

    /// Resolve a record whose type is not known in advance.
    ///
    /// Without `gedcom`, every typed factory is asked in turn and the first
    /// match wins. Otherwise (or if none match) the record is loaded from the
    /// shared table and its pending changes, typed from its level-0 line, and
    /// built by the matching factory. Unknown tags give a generic record.
    pub async fn make(
        &mut self,
        xref: &str,
        tree: &Arc<Tree>,
        gedcom: Option<&str>,
    ) -> ResolveResult<Option<Arc<GedcomRecord>>> {
        if gedcom.is_none() {
            for factory in &self.chain {
                let found = factory
                    .try_resolve(self.store.as_ref(), &mut self.cache, xref, tree, None)
                    .await?;
                if found.is_some() {
                    return Ok(found);
                }
            }
        }

        let key = CacheKey::generic(xref, tree.id);
        if let Some(cached) = self.cache.get(&key) {
            debug!("record cache hit for {}@{}", xref, tree.name);
            return Ok(cached);
        }

        let base = match gedcom {
            Some(gedcom) => Some(gedcom.to_string()),
            None => {
                let excluded: Vec<&str> = RecordKind::OTHER_TABLE_TYPED
                    .iter()
                    .filter_map(|kind| kind.tag())
                    .collect();
                self.store.other_gedcom(xref, tree.id, &excluded).await?
            }
        };
        let overlay = self.store.pending_overlay(xref, tree.id).await?;

        if base.is_none() && overlay.is_none() {
            debug!("no record {}@{}", xref, tree.name);
            self.cache.put(key, None);
            return Ok(None);
        }

        let source = [
            base.as_deref(),
            overlay.as_ref().map(|o| o.new_gedcom.as_str()),
            overlay.as_ref().map(|o| o.old_gedcom.as_str()),
        ]
        .into_iter()
        .flatten()
        .find(|gedcom| !gedcom.is_empty())
        .unwrap_or("");

        let header = parse_header(source)?;
        let canonical = header.xref.unwrap_or(xref).to_string();
        let kind = RecordKind::from_tag(header.tag);

        debug!("dispatching {}@{} as {:?}", canonical, tree.name, kind);

        let record = self.construct(
            kind,
            &canonical,
            base.unwrap_or_default(),
            overlay.map(|o| o.new_gedcom),
            tree.clone(),
        );

        self.cache.put(key, Some(record.clone()));
        Ok(Some(record))
    }

    /// Resolve `xref` through one typed factory only.
    pub async fn make_typed(
        &mut self,
        kind: RecordKind,
        xref: &str,
        tree: &Arc<Tree>,
        gedcom: Option<&str>,
    ) -> ResolveResult<Option<Arc<GedcomRecord>>> {
        match self.chain.iter().position(|factory| factory.kind() == kind) {
            Some(index) => {
                self.chain[index]
                    .try_resolve(self.store.as_ref(), &mut self.cache, xref, tree, gedcom)
                    .await
            }
            None => self.make(xref, tree, gedcom).await,
        }
    }

    /// Build a record of `kind` from GEDCOM in hand, without storage or cache.
    pub fn construct(
        &self,
        kind: RecordKind,
        xref: &str,
        gedcom: String,
        pending: Option<String>,
        tree: Arc<Tree>,
    ) -> Arc<GedcomRecord> {
        match self.factory(kind) {
            Some(factory) => factory.construct(xref, gedcom, pending, tree),
            None => Arc::new(GedcomRecord::new(RecordKind::Generic, xref, gedcom, pending, tree)),
        }
    }

    /// Build the record a pending change applies to, typed from its old
    /// version (or its new one, for creations).
    pub fn construct_from_overlay(
        &self,
        xref: &str,
        old_gedcom: &str,
        new_gedcom: &str,
        tree: Arc<Tree>,
    ) -> ResolveResult<Arc<GedcomRecord>> {
        let source = if old_gedcom.is_empty() { new_gedcom } else { old_gedcom };
        let header = parse_header(source)?;

        Ok(self.construct(
            RecordKind::from_tag(header.tag),
            xref,
            old_gedcom.to_string(),
            Some(new_gedcom.to_string()),
            tree,
        ))
    }

    /// Map one row of a bulk query to its record.
    pub async fn map_row(&mut self, tree: &Arc<Tree>, row: &RecordRow) -> ResolveResult<Arc<GedcomRecord>> {
        self.make(&row.xref, tree, Some(&row.gedcom))
            .await?
            .ok_or_else(|| ResolveError::Storage(anyhow!("row {} did not produce a record", row.xref)))
    }

    /// Forget what this request resolved for `xref`, after its pending state
    /// changed.
    pub fn forget(&mut self, xref: &str, tree_id: TreeId) {
        self.cache.forget(xref, tree_id);
    }
}
