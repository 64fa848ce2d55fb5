use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::api::handlers::{
    api_error, check_record_access, find_tree, resolve_error, ApiError, AppState, RecordResponse,
};
use crate::factory::Factories;
use crate::gedcom::{tag_label, Fact};
use crate::model::{UserContext, PREF_SHOW_GEDCOM_RECORD};
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct EditFactQuery {
    pub xref: String,
    pub fact_id: String,
}

/// Everything the fact editor needs to render.
#[derive(Debug, Serialize)]
pub struct EditFactResponse {
    pub title: String,
    pub tree: String,
    pub record: RecordResponse,
    pub edit_fact: Fact,
    /// Whether the raw GEDCOM of the fact may be edited directly.
    pub can_edit_raw: bool,
}

pub async fn edit_fact<S: Store + 'static>(
    State(store): State<AppState<S>>,
    mut factories: Factories<S>,
    user: UserContext,
    Path(tree_name): Path<String>,
    Query(query): Query<EditFactQuery>,
) -> Result<Json<EditFactResponse>, ApiError> {
    let tree = find_tree(store.as_ref(), &tree_name).await?;

    let record = factories
        .make(&query.xref, &tree, None)
        .await
        .map_err(resolve_error)?;
    let record = check_record_access(record, &user, true)?;

    let fact = record
        .fact(&query.fact_id)
        .filter(|fact| record.can_edit_fact(fact, &user))
        .cloned()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Fact not found"))?;

    let can_edit_raw = user.is_admin() || tree.preference_enabled(PREF_SHOW_GEDCOM_RECORD);
    let title = format!("{} - {}", record.full_name(), tag_label(&fact.tag));

    Ok(Json(EditFactResponse {
        title,
        tree: tree.name.clone(),
        record: RecordResponse::new(&record, &user),
        edit_fact: fact,
        can_edit_raw,
    }))
}
