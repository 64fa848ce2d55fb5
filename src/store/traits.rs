use crate::model::{
    NewPendingChange, PendingChange, PendingOverlay, RecordKind, RecordRow, Tree, TreeId,
};
use anyhow::Result;

/// Registry of trees, the scope every xref lives in.
#[async_trait::async_trait]
pub trait TreeStore: Send + Sync {
    async fn get_tree(&self, id: TreeId) -> Result<Option<Tree>>;
    async fn get_tree_by_name(&self, name: &str) -> Result<Option<Tree>>;
    async fn list_trees(&self) -> Result<Vec<Tree>>;
    async fn upsert_tree(&self, tree: Tree) -> Result<()>;
}

/// Committed GEDCOM records.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Committed GEDCOM of `xref` from the dedicated table for `kind`.
    /// NOTE, REPO and SUBM share the `other` table but are filtered by type.
    async fn typed_gedcom(&self, kind: RecordKind, xref: &str, tree_id: TreeId) -> Result<Option<String>>;
    /// Committed GEDCOM from the `other` table, skipping rows whose type is
    /// one of `excluded_tags`.
    async fn other_gedcom(&self, xref: &str, tree_id: TreeId, excluded_tags: &[&str]) -> Result<Option<String>>;
    /// All committed records of one kind, ordered by xref.
    async fn list_records(&self, kind: RecordKind, tree_id: TreeId) -> Result<Vec<RecordRow>>;
    /// Insert or replace a record; the table is chosen from its level-0 tag.
    async fn save_record(&self, tree_id: TreeId, xref: &str, gedcom: &str) -> Result<()>;
    async fn delete_record(&self, tree_id: TreeId, xref: &str) -> Result<bool>;
}

/// Staged edits awaiting moderation.
#[async_trait::async_trait]
pub trait PendingChangeStore: Send + Sync {
    /// Combined pending state of `xref`, `None` when nothing is pending.
    async fn pending_overlay(&self, xref: &str, tree_id: TreeId) -> Result<Option<PendingOverlay>>;
    /// All pending changes across trees, ordered by tree, xref and change id.
    async fn list_pending_changes(&self) -> Result<Vec<PendingChange>>;
    async fn get_change(&self, change_id: i64) -> Result<Option<PendingChange>>;
    async fn add_pending_change(&self, change: NewPendingChange) -> Result<PendingChange>;
    /// Accept a change together with every earlier pending change to the same
    /// record, writing its new GEDCOM. Returns the number of changes accepted.
    async fn accept_change(&self, change_id: i64) -> Result<usize>;
    /// Reject a change together with every later pending change to the same
    /// record. Returns the number of changes rejected.
    async fn reject_change(&self, change_id: i64) -> Result<usize>;
}

pub trait Store: TreeStore + RecordStore + PendingChangeStore + Send + Sync {}
impl<T: TreeStore + RecordStore + PendingChangeStore + Send + Sync> Store for T {}
