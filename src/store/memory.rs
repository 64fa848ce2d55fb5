use anyhow::{bail, Result};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::gedcom::extract_type;
use crate::model::{
    ChangeStatus, NewPendingChange, PendingChange, PendingOverlay, RecordKind, RecordRow, Tree,
    TreeId, Xref,
};
use crate::store::traits::{PendingChangeStore, RecordStore, TreeStore};

#[derive(Debug, Clone)]
struct StoredRecord {
    tag: String,
    gedcom: String,
}

impl StoredRecord {
    fn kind(&self) -> RecordKind {
        RecordKind::from_tag(&self.tag)
    }

    /// Rows of the shared `other` table: everything without its own table.
    fn in_other_table(&self) -> bool {
        !matches!(
            self.kind(),
            RecordKind::Individual | RecordKind::Family | RecordKind::Media | RecordKind::Source
        )
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    trees: BTreeMap<TreeId, Tree>,
    records: BTreeMap<(TreeId, Xref), StoredRecord>,
    changes: Vec<PendingChange>,
    next_change_id: i64,
}

impl MemoryState {
    fn save(&mut self, tree_id: TreeId, xref: &str, gedcom: &str) -> Result<()> {
        let tag = extract_type(gedcom)?;
        self.records.insert(
            (tree_id, xref.to_string()),
            StoredRecord {
                tag,
                gedcom: gedcom.to_string(),
            },
        );
        Ok(())
    }

    fn pending_for<'a>(&'a self, tree_id: TreeId, xref: &'a str) -> impl Iterator<Item = &'a PendingChange> + 'a {
        self.changes.iter().filter(move |change| {
            change.tree_id == tree_id && change.xref == xref && change.status == ChangeStatus::Pending
        })
    }
}

/// Store backed by in-process maps, with the same table semantics as
/// [`PostgresStore`](crate::store::PostgresStore).
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TreeStore for MemoryStore {
    async fn get_tree(&self, id: TreeId) -> Result<Option<Tree>> {
        Ok(self.state.read().trees.get(&id).cloned())
    }

    async fn get_tree_by_name(&self, name: &str) -> Result<Option<Tree>> {
        Ok(self
            .state
            .read()
            .trees
            .values()
            .find(|tree| tree.name == name)
            .cloned())
    }

    async fn list_trees(&self) -> Result<Vec<Tree>> {
        Ok(self.state.read().trees.values().cloned().collect())
    }

    async fn upsert_tree(&self, tree: Tree) -> Result<()> {
        let mut state = self.state.write();
        if state
            .trees
            .values()
            .any(|existing| existing.name == tree.name && existing.id != tree.id)
        {
            bail!("Tree name '{}' is already in use", tree.name);
        }
        state.trees.insert(tree.id, tree);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn typed_gedcom(&self, kind: RecordKind, xref: &str, tree_id: TreeId) -> Result<Option<String>> {
        if kind == RecordKind::Generic {
            return self.other_gedcom(xref, tree_id, &[]).await;
        }

        let state = self.state.read();
        Ok(state
            .records
            .get(&(tree_id, xref.to_string()))
            .filter(|record| record.kind() == kind)
            .map(|record| record.gedcom.clone()))
    }

    async fn other_gedcom(&self, xref: &str, tree_id: TreeId, excluded_tags: &[&str]) -> Result<Option<String>> {
        let state = self.state.read();
        Ok(state
            .records
            .get(&(tree_id, xref.to_string()))
            .filter(|record| record.in_other_table())
            .filter(|record| !excluded_tags.contains(&record.tag.as_str()))
            .map(|record| record.gedcom.clone()))
    }

    async fn list_records(&self, kind: RecordKind, tree_id: TreeId) -> Result<Vec<RecordRow>> {
        let state = self.state.read();
        Ok(state
            .records
            .iter()
            .filter(|((record_tree, _), _)| *record_tree == tree_id)
            .filter(|(_, record)| record.kind() == kind)
            .map(|((_, xref), record)| RecordRow::new(xref.clone(), record.gedcom.clone()))
            .collect())
    }

    async fn save_record(&self, tree_id: TreeId, xref: &str, gedcom: &str) -> Result<()> {
        self.state.write().save(tree_id, xref, gedcom)
    }

    async fn delete_record(&self, tree_id: TreeId, xref: &str) -> Result<bool> {
        Ok(self
            .state
            .write()
            .records
            .remove(&(tree_id, xref.to_string()))
            .is_some())
    }
}

#[async_trait::async_trait]
impl PendingChangeStore for MemoryStore {
    async fn pending_overlay(&self, xref: &str, tree_id: TreeId) -> Result<Option<PendingOverlay>> {
        let state = self.state.read();
        let mut changes: Vec<&PendingChange> = state.pending_for(tree_id, xref).collect();
        changes.sort_by_key(|change| change.change_id);
        Ok(PendingOverlay::from_changes(changes))
    }

    async fn list_pending_changes(&self) -> Result<Vec<PendingChange>> {
        let state = self.state.read();
        let mut changes: Vec<PendingChange> = state
            .changes
            .iter()
            .filter(|change| change.status == ChangeStatus::Pending)
            .cloned()
            .collect();
        changes.sort_by(|a, b| (a.tree_id, &a.xref, a.change_id).cmp(&(b.tree_id, &b.xref, b.change_id)));
        Ok(changes)
    }

    async fn get_change(&self, change_id: i64) -> Result<Option<PendingChange>> {
        Ok(self
            .state
            .read()
            .changes
            .iter()
            .find(|change| change.change_id == change_id)
            .cloned())
    }

    async fn add_pending_change(&self, change: NewPendingChange) -> Result<PendingChange> {
        let mut state = self.state.write();
        let Some(tree_name) = state.trees.get(&change.tree_id).map(|tree| tree.name.clone()) else {
            bail!("Unknown tree {}", change.tree_id);
        };

        state.next_change_id += 1;
        let pending = PendingChange {
            change_id: state.next_change_id,
            tree_id: change.tree_id,
            tree_name,
            xref: change.xref,
            old_gedcom: change.old_gedcom,
            new_gedcom: change.new_gedcom,
            status: ChangeStatus::Pending,
            user_name: change.user_name,
            real_name: change.real_name,
            change_time: Utc::now(),
        };
        state.changes.push(pending.clone());
        Ok(pending)
    }

    async fn accept_change(&self, change_id: i64) -> Result<usize> {
        let mut state = self.state.write();
        let Some(change) = state
            .changes
            .iter()
            .find(|change| change.change_id == change_id && change.status == ChangeStatus::Pending)
            .cloned()
        else {
            return Ok(0);
        };

        if change.new_gedcom.is_empty() {
            state.records.remove(&(change.tree_id, change.xref.clone()));
        } else {
            state.save(change.tree_id, &change.xref, &change.new_gedcom)?;
        }

        let mut accepted = 0;
        for other in state.changes.iter_mut() {
            if other.tree_id == change.tree_id
                && other.xref == change.xref
                && other.change_id <= change_id
                && other.status == ChangeStatus::Pending
            {
                other.status = ChangeStatus::Accepted;
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    async fn reject_change(&self, change_id: i64) -> Result<usize> {
        let mut state = self.state.write();
        let Some(change) = state
            .changes
            .iter()
            .find(|change| change.change_id == change_id && change.status == ChangeStatus::Pending)
            .cloned()
        else {
            return Ok(0);
        };

        let mut rejected = 0;
        for other in state.changes.iter_mut() {
            if other.tree_id == change.tree_id
                && other.xref == change.xref
                && other.change_id >= change_id
                && other.status == ChangeStatus::Pending
            {
                other.status = ChangeStatus::Rejected;
                rejected += 1;
            }
        }
        Ok(rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_tree() -> MemoryStore {
        let store = MemoryStore::new();
        store.upsert_tree(Tree::new(1, "family1", "Family One")).await.unwrap();
        store
    }

    fn change(xref: &str, old_gedcom: &str, new_gedcom: &str) -> NewPendingChange {
        NewPendingChange {
            tree_id: 1,
            xref: xref.to_string(),
            old_gedcom: old_gedcom.to_string(),
            new_gedcom: new_gedcom.to_string(),
            user_name: "editor".to_string(),
            real_name: None,
        }
    }

    #[tokio::test]
    async fn test_table_semantics() {
        let store = store_with_tree().await;
        store.save_record(1, "I1", "0 @I1@ INDI\n1 NAME A").await.unwrap();
        store.save_record(1, "N1", "0 @N1@ NOTE text").await.unwrap();
        store.save_record(1, "L1", "0 @L1@ _LOC\n1 NAME Here").await.unwrap();

        assert!(store.typed_gedcom(RecordKind::Individual, "I1", 1).await.unwrap().is_some());
        assert!(store.typed_gedcom(RecordKind::Family, "I1", 1).await.unwrap().is_none());
        assert!(store.typed_gedcom(RecordKind::Note, "N1", 1).await.unwrap().is_some());
        assert!(store.typed_gedcom(RecordKind::Individual, "I1", 2).await.unwrap().is_none());

        // Individuals never live in the shared table.
        assert!(store.other_gedcom("I1", 1, &[]).await.unwrap().is_none());
        assert!(store.other_gedcom("N1", 1, &[]).await.unwrap().is_some());
        assert!(store.other_gedcom("N1", 1, &["NOTE", "REPO", "SUBM"]).await.unwrap().is_none());
        assert!(store.other_gedcom("L1", 1, &["NOTE", "REPO", "SUBM"]).await.unwrap().is_some());

        assert!(store.save_record(1, "X1", "garbage").await.is_err());
    }

    #[tokio::test]
    async fn test_accept_applies_latest_and_earlier() {
        let store = store_with_tree().await;
        store.save_record(1, "I1", "0 @I1@ INDI\n1 NAME A").await.unwrap();

        let first = store.add_pending_change(change("I1", "0 @I1@ INDI\n1 NAME A", "0 @I1@ INDI\n1 NAME B")).await.unwrap();
        let second = store.add_pending_change(change("I1", "0 @I1@ INDI\n1 NAME B", "0 @I1@ INDI\n1 NAME C")).await.unwrap();
        assert!(second.change_id > first.change_id);

        let overlay = store.pending_overlay("I1", 1).await.unwrap().unwrap();
        assert_eq!(overlay.old_gedcom, "0 @I1@ INDI\n1 NAME A");
        assert_eq!(overlay.new_gedcom, "0 @I1@ INDI\n1 NAME C");

        assert_eq!(store.accept_change(second.change_id).await.unwrap(), 2);
        assert_eq!(
            store.typed_gedcom(RecordKind::Individual, "I1", 1).await.unwrap().as_deref(),
            Some("0 @I1@ INDI\n1 NAME C")
        );
        assert!(store.pending_overlay("I1", 1).await.unwrap().is_none());
        assert_eq!(store.accept_change(second.change_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reject_discards_later_changes() {
        let store = store_with_tree().await;
        let first = store.add_pending_change(change("S1", "", "0 @S1@ SOUR\n1 TITL A")).await.unwrap();
        let second = store.add_pending_change(change("S1", "0 @S1@ SOUR\n1 TITL A", "0 @S1@ SOUR\n1 TITL B")).await.unwrap();

        assert_eq!(store.reject_change(first.change_id).await.unwrap(), 2);
        assert_eq!(store.get_change(second.change_id).await.unwrap().unwrap().status, ChangeStatus::Rejected);
        assert!(store.list_pending_changes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accept_deletion_removes_record() {
        let store = store_with_tree().await;
        store.save_record(1, "R1", "0 @R1@ REPO\n1 NAME Archive").await.unwrap();
        let deletion = store.add_pending_change(change("R1", "0 @R1@ REPO\n1 NAME Archive", "")).await.unwrap();

        assert_eq!(store.accept_change(deletion.change_id).await.unwrap(), 1);
        assert!(store.typed_gedcom(RecordKind::Repository, "R1", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_tree_rejected() {
        let store = MemoryStore::new();
        assert!(store.add_pending_change(change("I1", "", "0 @I1@ INDI")).await.is_err());
    }
}
