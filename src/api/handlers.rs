use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
};
use log::{error, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::factory::{Factories, ResolveError};
use crate::gedcom::Fact;
use crate::model::{GedcomRecord, RecordKind, Tree, UserContext};
use crate::store::{RecordStore, Store, TreeStore};

pub type AppState<S> = Arc<S>;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

pub fn internal_error(e: anyhow::Error) -> ApiError {
    error!("storage failure: {:#}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("{:#}", e))
}

pub fn resolve_error(e: ResolveError) -> ApiError {
    match e {
        ResolveError::Malformed(e) => {
            error!("{}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
        ResolveError::Storage(e) => internal_error(e),
    }
}

/// Full view of one record, including its facts.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub xref: String,
    pub kind: RecordKind,
    pub tag: String,
    pub tree: String,
    pub url: String,
    pub name: String,
    /// The GEDCOM shown to this user, after pending edits and privacy.
    pub gedcom: String,
    pub pending_addition: bool,
    pub pending_deletion: bool,
    pub can_edit: bool,
    pub facts: Vec<Fact>,
}

impl RecordResponse {
    pub fn new(record: &GedcomRecord, user: &UserContext) -> Self {
        let visible = record.can_show(user);
        Self {
            xref: record.xref().to_string(),
            kind: record.kind(),
            tag: record.tag().to_string(),
            tree: record.tree().name.clone(),
            url: record.url(),
            name: record.display_name(user),
            gedcom: if visible {
                record.effective_gedcom().to_string()
            } else {
                record.private_gedcom()
            },
            pending_addition: record.is_pending_addition(),
            pending_deletion: record.is_pending_deletion(),
            can_edit: record.can_edit(user),
            facts: if visible { record.facts().to_vec() } else { Vec::new() },
        }
    }
}

/// Short view of a record for lists.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    pub xref: String,
    pub kind: RecordKind,
    pub url: String,
    pub name: String,
    pub pending_addition: bool,
    pub pending_deletion: bool,
}

impl RecordSummary {
    pub fn new(record: &GedcomRecord, user: &UserContext) -> Self {
        Self {
            xref: record.xref().to_string(),
            kind: record.kind(),
            url: record.url(),
            name: record.display_name(user),
            pending_addition: record.is_pending_addition(),
            pending_deletion: record.is_pending_deletion(),
        }
    }
}

// Helper function to load a tree by its route name
pub async fn find_tree<S: Store + 'static>(store: &S, name: &str) -> Result<Arc<Tree>, ApiError> {
    match store.get_tree_by_name(name).await {
        Ok(Some(tree)) => Ok(Arc::new(tree)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Tree not found")),
        Err(e) => Err(internal_error(e)),
    }
}

/// Turn a lookup result into a record the user may see (and, with `edit`,
/// modify), or the matching error.
pub fn check_record_access(
    record: Option<Arc<GedcomRecord>>,
    user: &UserContext,
    edit: bool,
) -> Result<Arc<GedcomRecord>, ApiError> {
    let Some(record) = record else {
        return Err(api_error(StatusCode::NOT_FOUND, "Record not found"));
    };
    if !record.can_show(user) {
        warn!("{} may not view {}", user.user_name, record.xref());
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "You do not have permission to view this record",
        ));
    }
    if edit && !record.can_edit(user) {
        warn!("{} may not edit {}", user.user_name, record.xref());
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "You do not have permission to edit this record",
        ));
    }
    Ok(record)
}

fn parse_segment(segment: &str) -> Result<RecordKind, ApiError> {
    RecordKind::from_route_segment(segment)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, &format!("Unknown record type '{}'", segment)))
}

/// Show one record. A record requested under the wrong type redirects to its
/// own page.
pub async fn get_record<S: Store + 'static>(
    State(store): State<AppState<S>>,
    mut factories: Factories<S>,
    user: UserContext,
    Path((tree_name, segment, xref)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let kind = parse_segment(&segment)?;
    let tree = find_tree(store.as_ref(), &tree_name).await?;

    let mut record = factories
        .make_typed(kind, &xref, &tree, None)
        .await
        .map_err(resolve_error)?;
    if record.is_none() && kind != RecordKind::Generic {
        record = factories.make(&xref, &tree, None).await.map_err(resolve_error)?;
    }
    let record = check_record_access(record, &user, false)?;

    if record.kind() != kind || record.xref() != xref {
        return Ok(Redirect::permanent(&record.url()).into_response());
    }

    Ok(Json(RecordResponse::new(&record, &user)).into_response())
}

/// List every committed record of one type in a tree.
pub async fn list_records<S: Store + 'static>(
    State(store): State<AppState<S>>,
    mut factories: Factories<S>,
    user: UserContext,
    Path((tree_name, segment)): Path<(String, String)>,
) -> Result<Json<ListResponse<RecordSummary>>, ApiError> {
    let kind = parse_segment(&segment)?;
    let tree = find_tree(store.as_ref(), &tree_name).await?;

    let rows = store
        .list_records(kind, tree.id)
        .await
        .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let record = factories.map_row(&tree, row).await.map_err(resolve_error)?;
        if record.can_show(&user) {
            items.push(RecordSummary::new(&record, &user));
        }
    }

    let total = items.len();
    Ok(Json(ListResponse { items, total }))
}
