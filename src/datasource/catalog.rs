//! Relational catalog collaborator.
//!
//! A [`SourceCatalog`] exposes the source database as raw entity records
//! plus forward-only row cursors. Extracting this metadata from a live
//! connection (JDBC-style introspection, dialect quirks) is the
//! implementor's problem; the core only consumes the normalized records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use crate::schema_model::InheritancePattern;

/// A single column value as read from the source. Nullability is expressed
/// with `SqlValue::Null`.
pub type SqlValue = serde_json::Value;

/// One source row, keyed by column name.
pub type Row = HashMap<String, SqlValue>;

/// Raw description of one source table or view, as reported by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    /// Columns in declaration order; ordinal position is the index.
    pub columns: Vec<ColumnDef>,
    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDef>,
    /// Present when this entity is a subclass in an inheritance tree.
    #[serde(default)]
    pub inheritance: Option<InheritanceDef>,
    /// Discriminator column, declared on the root of a table-per-hierarchy
    /// tree.
    #[serde(default)]
    pub discriminator_column: Option<String>,
    /// Discriminator value selecting this entity's rows out of the shared
    /// table (table-per-hierarchy only; also valid on a concrete root).
    #[serde(default)]
    pub discriminator_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Declared source type name, e.g. `VARCHAR` or `DECIMAL(10,2)`.
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    /// Referencing columns on this entity, positionally matched with
    /// `referenced_columns`.
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// Inheritance metadata attached to a subclass entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InheritanceDef {
    pub parent: String,
    pub pattern: InheritancePattern,
}

/// Forward-only cursor over the rows of one entity. Dropping the cursor
/// releases the underlying resultset.
pub trait RowCursor {
    fn next_row(&mut self) -> Result<Option<Row>, CatalogError>;
}

/// Read access to the source database.
///
/// Methods take `&self`: implementations typically wrap a client handle
/// with interior state, and open cursors must not freeze catalog access
/// (the hierarchy resolver issues point lookups while a row stream is
/// being consumed).
pub trait SourceCatalog {
    /// All entities of the source schema, in catalog declaration order.
    fn entity_defs(&self) -> Result<Vec<EntityDef>, CatalogError>;

    /// Stream every row of `table`.
    fn stream_rows(&self, table: &str) -> Result<Box<dyn RowCursor + '_>, CatalogError>;

    /// Stream the rows of `table` where `column` equals `value`. Used to
    /// select one entity's rows out of a shared table-per-hierarchy table.
    fn stream_rows_where(
        &self,
        table: &str,
        column: &str,
        value: &SqlValue,
    ) -> Result<Box<dyn RowCursor + '_>, CatalogError>;

    /// Point lookup by key. `key_columns` and `key_values` are positionally
    /// matched.
    fn lookup_by_key(
        &self,
        table: &str,
        key_columns: &[String],
        key_values: &[SqlValue],
    ) -> Result<Option<Row>, CatalogError>;
}
