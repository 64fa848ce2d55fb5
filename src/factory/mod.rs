//! Turning xrefs and raw GEDCOM into typed records.
//!
//! Each record type has a factory that can look an xref up in its own table
//! or build a record from GEDCOM already in hand. [`Factories`] strings them
//! together for lookups where the type is not known in advance, and memoizes
//! every result for the lifetime of one request.

pub mod cache;
pub mod registry;
pub mod typed;

pub use cache::*;
pub use registry::*;
pub use typed::*;

use crate::gedcom::MalformedRecordError;
use crate::model::{GedcomRecord, RecordKind, Tree};
use crate::store::Store;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

#[async_trait::async_trait]
pub trait RecordFactory: Send + Sync {
    fn kind(&self) -> RecordKind;

    /// Look `xref` up as a record of this factory's type. `Ok(None)` means
    /// the xref is not of this type or does not exist.
    async fn try_resolve(
        &self,
        store: &dyn Store,
        cache: &mut RecordCache,
        xref: &str,
        tree: &Arc<Tree>,
        gedcom: Option<&str>,
    ) -> ResolveResult<Option<Arc<GedcomRecord>>>;

    /// Build a record from GEDCOM already loaded. `gedcom` is empty for
    /// records that only exist as pending changes; `pending` is `None` when
    /// there is no pending edit and empty for a pending deletion.
    fn construct(
        &self,
        xref: &str,
        gedcom: String,
        pending: Option<String>,
        tree: Arc<Tree>,
    ) -> Arc<GedcomRecord>;
}
