use crate::model::{TreeId, Xref};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Accepted => "accepted",
            ChangeStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "accepted" => ChangeStatus::Accepted,
            "rejected" => ChangeStatus::Rejected,
            _ => ChangeStatus::Pending, // Default fallback
        }
    }
}

/// One staged edit of a record, awaiting moderation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Monotonic sequence number; later edits have larger ids.
    pub change_id: i64,
    pub tree_id: TreeId,
    pub tree_name: String,
    pub xref: Xref,
    /// Empty when the change creates the record.
    pub old_gedcom: String,
    /// Empty when the change deletes the record.
    pub new_gedcom: String,
    pub status: ChangeStatus,
    pub user_name: String,
    pub real_name: Option<String>,
    pub change_time: DateTime<Utc>,
}

impl PendingChange {
    /// GEDCOM to read the record type from.
    pub fn type_source(&self) -> &str {
        if self.old_gedcom.is_empty() {
            &self.new_gedcom
        } else {
            &self.old_gedcom
        }
    }
}

/// Request to stage a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPendingChange {
    pub tree_id: TreeId,
    pub xref: Xref,
    pub old_gedcom: String,
    pub new_gedcom: String,
    pub user_name: String,
    pub real_name: Option<String>,
}

/// The combined pending state of one record: the version the first pending
/// change replaced and the version the last pending change produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOverlay {
    pub old_gedcom: String,
    pub new_gedcom: String,
}

impl PendingOverlay {
    /// `None` when there are no changes, or when they create a record and
    /// then delete it again.
    pub fn from_changes<'a>(changes: impl IntoIterator<Item = &'a PendingChange>) -> Option<Self> {
        let mut changes = changes.into_iter();
        let first = changes.next()?;
        let last = changes.last().unwrap_or(first);

        if first.old_gedcom.is_empty() && last.new_gedcom.is_empty() {
            return None;
        }

        Some(Self {
            old_gedcom: first.old_gedcom.clone(),
            new_gedcom: last.new_gedcom.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordChanges {
    pub xref: Xref,
    pub changes: Vec<PendingChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeChanges {
    pub tree_id: TreeId,
    pub tree_name: String,
    pub records: Vec<RecordChanges>,
}

/// Group changes by tree, then by record, each record's changes in the order
/// they were submitted.
pub fn group_pending_changes(mut changes: Vec<PendingChange>) -> Vec<TreeChanges> {
    changes.sort_by(|a, b| {
        (a.tree_id, &a.xref, a.change_id).cmp(&(b.tree_id, &b.xref, b.change_id))
    });

    let by_tree = changes.into_iter().chunk_by(|change| change.tree_id);
    let mut trees = Vec::new();

    for (tree_id, tree_changes) in &by_tree {
        let tree_changes: Vec<PendingChange> = tree_changes.collect();
        let tree_name = tree_changes
            .first()
            .map(|change| change.tree_name.clone())
            .unwrap_or_default();

        let by_xref = tree_changes.into_iter().chunk_by(|change| change.xref.clone());
        let records = (&by_xref)
            .into_iter()
            .map(|(xref, group)| RecordChanges {
                xref,
                changes: group.collect(),
            })
            .collect();

        trees.push(TreeChanges {
            tree_id,
            tree_name,
            records,
        });
    }

    trees
}
