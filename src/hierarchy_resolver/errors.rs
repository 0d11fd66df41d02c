use thiserror::Error;

use crate::datasource::CatalogError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    /// A discriminator value read from the data has no entity mapped to it.
    /// Recoverable: the caller omits the edge and keeps going.
    #[error("discriminator value `{value}` of hierarchy `{bag}` maps to no entity")]
    UnmappedDiscriminator { bag: String, value: String },

    /// The bag claims table-per-hierarchy but carries no discriminator
    /// column. Catalog inconsistency, fatal.
    #[error("hierarchy `{bag}` has no discriminator column")]
    MissingDiscriminatorColumn { bag: String },

    /// Lookup against the source failed. Fatal for the run.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ResolveError {
    /// Whether the import engine may skip the edge and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ResolveError::UnmappedDiscriminator { .. })
    }
}
