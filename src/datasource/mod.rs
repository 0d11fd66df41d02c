//! Collaborator boundaries of the migration core.
//!
//! The core never talks to a database driver or a graph store directly. It
//! consumes a [`SourceCatalog`] (relational metadata and row access), writes
//! through a [`GraphStore`] (vertex/edge upserts) and delegates identifier
//! casing to a [`NameResolver`]. Concrete implementations live with the
//! caller; this module owns the contracts and the raw catalog records they
//! exchange.

pub mod catalog;
pub mod errors;
pub mod graph_store;
pub mod name_resolver;

#[cfg(test)]
pub mod testing;

pub use catalog::{
    ColumnDef, EntityDef, ForeignKeyDef, InheritanceDef, Row, RowCursor, SourceCatalog, SqlValue,
};
pub use errors::{CatalogError, StoreError};
pub use graph_store::{GraphStore, VertexHandle, VertexUpsert};
pub use name_resolver::{DefaultNameResolver, IdentifierKind, NameResolver};
