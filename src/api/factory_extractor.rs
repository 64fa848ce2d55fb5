use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use std::sync::Arc;

use crate::factory::Factories;
use crate::store::Store;

/// Every request gets its own factory chain and record cache, so nothing
/// resolved while serving one request leaks into another.
#[async_trait]
impl<S> FromRequestParts<Arc<S>> for Factories<S>
where
    S: Store + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &Arc<S>) -> Result<Self, Self::Rejection> {
        Ok(Factories::new(state.clone()))
    }
}
