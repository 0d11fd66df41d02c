use serde::{Deserialize, Serialize};

use super::property::ModelProperty;
use super::VertexTypeId;
use crate::schema_model::EntityId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexType {
    pub name: String,
    /// Properties in ordinal order.
    pub properties: Vec<ModelProperty>,
    /// Property names forming the natural key used for upsert lookup.
    pub external_key: Vec<String>,
    pub parent_type: Option<VertexTypeId>,
    /// 0 = root (and every vertex type outside a hierarchy).
    pub inheritance_level: u32,
    /// The source table looked like a join table but imported as a vertex
    /// (the aggregation tie-break demoted it).
    pub is_from_join_table: bool,
    /// Set once the full row set of this type has been imported; a rerun
    /// skips the type entirely (resume at vertex-type granularity).
    pub analyzed_in_last_migration: bool,
    pub source_entity: Option<EntityId>,
}

impl VertexType {
    pub fn property(&self, name: &str) -> Option<&ModelProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_for_column(&self, column: &str) -> Option<&ModelProperty> {
        self.properties
            .iter()
            .find(|p| p.source_column.eq_ignore_ascii_case(column))
    }

    /// Whether this vertex type's properties claim all of the given source
    /// columns. Used to pick the right partition of a split entity when
    /// connecting a foreign key.
    pub fn claims_columns(&self, columns: &[String]) -> bool {
        columns
            .iter()
            .all(|c| self.property_for_column(c).is_some())
    }
}
