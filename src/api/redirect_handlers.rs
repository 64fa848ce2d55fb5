use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::handlers::{api_error, internal_error, resolve_error, ApiError, AppState};
use crate::factory::Factories;
use crate::model::{RecordKind, UserContext};
use crate::store::{Store, TreeStore};

/// Query string of the old `repo.php` page.
#[derive(Debug, Deserialize)]
pub struct RepoPhpQuery {
    pub ged: Option<String>,
    pub rid: Option<String>,
}

/// Permanently redirect old `repo.php?ged=..&rid=..` links to the
/// repository's current page.
pub async fn redirect_repo_php<S: Store + 'static>(
    State(store): State<AppState<S>>,
    mut factories: Factories<S>,
    user: UserContext,
    Query(query): Query<RepoPhpQuery>,
) -> Result<Response, ApiError> {
    let not_found = || api_error(StatusCode::NOT_FOUND, "Repository not found");

    let (Some(ged), Some(rid)) = (query.ged, query.rid) else {
        return Err(not_found());
    };

    let tree = store
        .get_tree_by_name(&ged)
        .await
        .map_err(internal_error)?
        .map(Arc::new)
        .ok_or_else(not_found)?;

    let repository = factories
        .make_typed(RecordKind::Repository, &rid, &tree, None)
        .await
        .map_err(resolve_error)?
        .filter(|repository| repository.can_show(&user))
        .ok_or_else(not_found)?;

    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, repository.url())],
    )
        .into_response())
}
