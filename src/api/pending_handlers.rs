use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::handlers::{
    api_error, find_tree, internal_error, resolve_error, ApiError, AppState, RecordSummary,
};
use crate::factory::Factories;
use crate::gedcom::parse_header;
use crate::model::{
    group_pending_changes, NewPendingChange, PendingChange, Tree, TreeId, UserContext,
};
use crate::store::{PendingChangeStore, Store, TreeStore};

#[derive(Debug, Deserialize)]
pub struct PendingChangesQuery {
    /// Page to return to after moderating.
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChangeView {
    pub change_id: i64,
    pub change_time: DateTime<Utc>,
    pub user_name: String,
    pub real_name: Option<String>,
    pub old_gedcom: String,
    pub new_gedcom: String,
    pub record: RecordSummary,
}

#[derive(Debug, Serialize)]
pub struct RecordChangesView {
    pub xref: String,
    pub changes: Vec<ChangeView>,
}

#[derive(Debug, Serialize)]
pub struct TreeChangesView {
    pub tree_name: String,
    pub records: Vec<RecordChangesView>,
}

#[derive(Debug, Serialize)]
pub struct PendingChangesResponse {
    pub title: String,
    pub tree: String,
    pub url: String,
    /// Tree whose changes are shown first: this one if it has any.
    pub active_tree_name: Option<String>,
    pub changes: Vec<TreeChangesView>,
}

#[derive(Debug, Deserialize)]
pub struct StageChangeRequest {
    pub xref: String,
    /// Empty to delete the record.
    pub new_gedcom: String,
}

#[derive(Debug, Serialize)]
pub struct ModerationResponse {
    pub change_id: i64,
    /// Number of changes whose status was updated.
    pub updated: usize,
    /// The record as it now stands, if it still exists.
    pub record: Option<RecordSummary>,
}

fn require_moderator(user: &UserContext) -> Result<(), ApiError> {
    if user.can_moderate() {
        Ok(())
    } else {
        warn!("{} may not moderate pending changes", user.user_name);
        Err(api_error(
            StatusCode::FORBIDDEN,
            "Only moderators can review pending changes",
        ))
    }
}

/// Every pending change across all trees, grouped by tree and record.
pub async fn list_pending_changes<S: Store + 'static>(
    State(store): State<AppState<S>>,
    factories: Factories<S>,
    user: UserContext,
    Path(tree_name): Path<String>,
    Query(query): Query<PendingChangesQuery>,
) -> Result<Json<PendingChangesResponse>, ApiError> {
    require_moderator(&user)?;
    let tree = find_tree(store.as_ref(), &tree_name).await?;

    let trees: HashMap<TreeId, Arc<Tree>> = store
        .list_trees()
        .await
        .map_err(internal_error)?
        .into_iter()
        .map(|tree| (tree.id, Arc::new(tree)))
        .collect();

    let changes = store.list_pending_changes().await.map_err(internal_error)?;
    let grouped = group_pending_changes(changes);

    let mut views = Vec::with_capacity(grouped.len());
    for tree_changes in grouped {
        let change_tree = trees.get(&tree_changes.tree_id).cloned().unwrap_or_else(|| {
            Arc::new(Tree::new(
                tree_changes.tree_id,
                tree_changes.tree_name.clone(),
                tree_changes.tree_name.clone(),
            ))
        });

        let mut records = Vec::with_capacity(tree_changes.records.len());
        for record_changes in tree_changes.records {
            let changes = record_changes
                .changes
                .into_iter()
                .map(|change| change_view(&factories, change, &change_tree, &user))
                .collect::<Result<Vec<_>, _>>()?;
            records.push(RecordChangesView {
                xref: record_changes.xref,
                changes,
            });
        }

        views.push(TreeChangesView {
            tree_name: tree_changes.tree_name,
            records,
        });
    }

    let active_tree_name = if views.iter().any(|view| view.tree_name == tree.name) {
        Some(tree.name.clone())
    } else {
        views.first().map(|view| view.tree_name.clone())
    };

    Ok(Json(PendingChangesResponse {
        title: "Pending changes".to_string(),
        tree: tree.name.clone(),
        url: query.url.unwrap_or_else(|| format!("/tree/{}", tree.name)),
        active_tree_name,
        changes: views,
    }))
}

fn change_view<S: Store + 'static>(
    factories: &Factories<S>,
    change: PendingChange,
    tree: &Arc<Tree>,
    user: &UserContext,
) -> Result<ChangeView, ApiError> {
    let record = factories
        .construct_from_overlay(&change.xref, &change.old_gedcom, &change.new_gedcom, tree.clone())
        .map_err(resolve_error)?;

    Ok(ChangeView {
        change_id: change.change_id,
        change_time: change.change_time,
        user_name: change.user_name,
        real_name: change.real_name,
        old_gedcom: change.old_gedcom,
        new_gedcom: change.new_gedcom,
        record: RecordSummary::new(&record, user),
    })
}

/// Stage an edit, creation or deletion of a record for moderation.
pub async fn stage_change<S: Store + 'static>(
    State(store): State<AppState<S>>,
    mut factories: Factories<S>,
    user: UserContext,
    Path(tree_name): Path<String>,
    RequestJson(request): RequestJson<StageChangeRequest>,
) -> Result<(StatusCode, Json<PendingChange>), ApiError> {
    if !user.can_edit() {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "You do not have permission to edit this tree",
        ));
    }
    let tree = find_tree(store.as_ref(), &tree_name).await?;

    if !request.new_gedcom.is_empty() {
        let header = parse_header(&request.new_gedcom)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, &e.to_string()))?;
        if header.xref.is_some_and(|xref| xref != request.xref) {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "GEDCOM xref does not match the record being changed",
            ));
        }
    }

    let current = factories
        .make(&request.xref, &tree, None)
        .await
        .map_err(resolve_error)?;
    let old_gedcom = match &current {
        Some(record) => {
            if !record.can_edit(&user) {
                return Err(api_error(
                    StatusCode::FORBIDDEN,
                    "You do not have permission to edit this record",
                ));
            }
            record.pending().unwrap_or(record.gedcom()).to_string()
        }
        None => String::new(),
    };

    if old_gedcom.is_empty() && request.new_gedcom.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Nothing to change"));
    }
    if old_gedcom == request.new_gedcom {
        return Err(api_error(StatusCode::BAD_REQUEST, "Record is unchanged"));
    }

    let change = store
        .add_pending_change(NewPendingChange {
            tree_id: tree.id,
            xref: request.xref.clone(),
            old_gedcom,
            new_gedcom: request.new_gedcom,
            user_name: user.user_name.clone(),
            real_name: user.real_name.clone(),
        })
        .await
        .map_err(internal_error)?;

    info!(
        "{} staged change {} for {}@{}",
        user.user_name, change.change_id, change.xref, tree.name
    );
    Ok((StatusCode::CREATED, Json(change)))
}

async fn moderated_change<S: Store + 'static>(
    store: &S,
    tree: &Tree,
    change_id: i64,
) -> Result<PendingChange, ApiError> {
    match store.get_change(change_id).await {
        Ok(Some(change)) if change.tree_id == tree.id => Ok(change),
        Ok(_) => Err(api_error(StatusCode::NOT_FOUND, "Change not found")),
        Err(e) => Err(internal_error(e)),
    }
}

async fn moderation_response<S: Store + 'static>(
    factories: &mut Factories<S>,
    change: &PendingChange,
    tree: &Arc<Tree>,
    updated: usize,
    user: &UserContext,
) -> Result<Json<ModerationResponse>, ApiError> {
    // Anything this request resolved before the status change is stale.
    factories.forget(&change.xref, tree.id);
    let record = factories
        .make(&change.xref, tree, None)
        .await
        .map_err(resolve_error)?;

    Ok(Json(ModerationResponse {
        change_id: change.change_id,
        updated,
        record: record.map(|record| RecordSummary::new(&record, user)),
    }))
}

/// Accept a change, together with every earlier pending change to the same
/// record.
pub async fn accept_change<S: Store + 'static>(
    State(store): State<AppState<S>>,
    mut factories: Factories<S>,
    user: UserContext,
    Path((tree_name, change_id)): Path<(String, i64)>,
) -> Result<Json<ModerationResponse>, ApiError> {
    require_moderator(&user)?;
    let tree = find_tree(store.as_ref(), &tree_name).await?;
    let change = moderated_change(store.as_ref(), &tree, change_id).await?;

    let accepted = store.accept_change(change_id).await.map_err(internal_error)?;
    if accepted == 0 {
        return Err(api_error(StatusCode::CONFLICT, "Change is no longer pending"));
    }

    info!(
        "{} accepted {} change(s) up to {} for {}@{}",
        user.user_name, accepted, change_id, change.xref, tree.name
    );
    moderation_response(&mut factories, &change, &tree, accepted, &user).await
}

/// Reject a change, together with every later pending change to the same
/// record.
pub async fn reject_change<S: Store + 'static>(
    State(store): State<AppState<S>>,
    mut factories: Factories<S>,
    user: UserContext,
    Path((tree_name, change_id)): Path<(String, i64)>,
) -> Result<Json<ModerationResponse>, ApiError> {
    require_moderator(&user)?;
    let tree = find_tree(store.as_ref(), &tree_name).await?;
    let change = moderated_change(store.as_ref(), &tree, change_id).await?;

    let rejected = store.reject_change(change_id).await.map_err(internal_error)?;
    if rejected == 0 {
        return Err(api_error(StatusCode::CONFLICT, "Change is no longer pending"));
    }

    info!(
        "{} rejected {} change(s) from {} for {}@{}",
        user.user_name, rejected, change_id, change.xref, tree.name
    );
    moderation_response(&mut factories, &change, &tree, rejected, &user).await
}
