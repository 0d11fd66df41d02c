//! Unrecoverable import failures.
//!
//! Row-level trouble (coercion failures, unresolvable polymorphic keys) is
//! handled inside the engine loop: the row or edge is skipped, logged and
//! counted. Everything that surfaces here aborts the run.

use thiserror::Error;

use super::ImportPhase;
use crate::datasource::{CatalogError, StoreError};
use crate::hierarchy_resolver::ResolveError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ImportError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("import cancelled during {phase:?}")]
    Cancelled { phase: ImportPhase },

    #[error("mandatory property `{property}` of `{vertex}` is null")]
    NullMandatoryProperty { vertex: String, property: String },

    #[error("no vertex type is mapped for entity `{entity}`")]
    UnmappedEntity { entity: String },

    #[error("no aggregation edge type is mapped for join table `{entity}`")]
    UnmappedJoinTable { entity: String },
}
