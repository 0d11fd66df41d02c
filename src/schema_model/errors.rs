//! Catalog inconsistency errors raised while wiring the schema model.
//!
//! All of these are fatal: the run aborts before any row is read.

use thiserror::Error;

use super::InheritancePattern;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaModelError {
    #[error("foreign key `{foreign_key}` of `{entity}` references unknown table `{table}`")]
    UnknownReferencedTable {
        entity: String,
        foreign_key: String,
        table: String,
    },

    #[error("foreign key `{foreign_key}` of `{entity}` has mismatched column counts")]
    ForeignKeyArity { entity: String, foreign_key: String },

    #[error("configured edge `{edge}` names unknown table `{table}`")]
    UnknownConfiguredTable { edge: String, table: String },

    #[error("`{entity}` inherits from unknown table `{parent}`")]
    UnknownParentTable { entity: String, parent: String },

    #[error("inheritance cycle involving `{entity}`")]
    InheritanceCycle { entity: String },

    #[error("hierarchy `{root}` mixes inheritance patterns {first:?} and {second:?}")]
    MixedInheritancePatterns {
        root: String,
        first: InheritancePattern,
        second: InheritancePattern,
    },

    #[error("table-per-hierarchy root `{root}` declares no discriminator column")]
    MissingDiscriminatorColumn { root: String },

    #[error("`{entity}` does not share the primary-key shape of hierarchy root `{root}`")]
    PrimaryKeyShapeMismatch { entity: String, root: String },
}
