use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::{edit_handlers, handlers, pending_handlers, redirect_handlers};
use crate::store::Store;

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Records
        .route(
            "/tree/:tree/:segment/:xref",
            get(handlers::get_record::<S>),
        )
        .route(
            "/tree/:tree/list/:segment",
            get(handlers::list_records::<S>),
        )
        .route("/tree/:tree/edit-fact", get(edit_handlers::edit_fact::<S>))
        // Moderation
        .route(
            "/tree/:tree/pending",
            get(pending_handlers::list_pending_changes::<S>)
                .post(pending_handlers::stage_change::<S>),
        )
        .route(
            "/tree/:tree/pending/:change_id/accept",
            post(pending_handlers::accept_change::<S>),
        )
        .route(
            "/tree/:tree/pending/:change_id/reject",
            post(pending_handlers::reject_change::<S>),
        )
        // Links from older versions of the site
        .route("/repo.php", get(redirect_handlers::redirect_repo_php::<S>))
}
