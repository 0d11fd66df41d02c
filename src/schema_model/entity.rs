//! Entities, attributes and keys of the relational model.

use serde::{Deserialize, Serialize};

use super::{BagId, EntityId, RelationshipId};
use crate::datasource::EntityDef;

/// One source table or view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Table the rows physically live in. Equals `name` except for
    /// table-per-hierarchy subclasses, which share the root's table.
    pub physical_table: String,
    pub attributes: Vec<Attribute>,
    pub primary_key: PrimaryKey,
    pub foreign_keys: Vec<ForeignKey>,
    /// Relationships where this entity is the foreign (FK-owning) side.
    pub out_relationships: Vec<RelationshipId>,
    /// Relationships where this entity is the referenced (parent) side.
    pub in_relationships: Vec<RelationshipId>,
    pub parent_entity: Option<EntityId>,
    /// 0 = hierarchy root (and every entity outside a hierarchy).
    pub inheritance_level: u32,
    pub bag: Option<BagId>,
    pub is_aggregable_join_table: bool,
    /// Join-table shape (two foreign keys covering the whole primary key),
    /// kept even when the tie-break demotes the entity to a plain vertex.
    pub has_join_table_shape: bool,
}

impl Entity {
    pub(super) fn from_def(def: &EntityDef) -> Self {
        Entity {
            name: def.name.clone(),
            physical_table: def.name.clone(),
            attributes: def
                .columns
                .iter()
                .enumerate()
                .map(|(i, c)| Attribute {
                    name: c.name.clone(),
                    ordinal_position: i,
                    data_type: c.data_type.clone(),
                })
                .collect(),
            primary_key: PrimaryKey {
                attributes: def.primary_key.clone(),
            },
            foreign_keys: def
                .foreign_keys
                .iter()
                .map(|fk| ForeignKey {
                    name: fk.name.clone(),
                    from_columns: fk.columns.clone(),
                    referenced_entity: fk.referenced_table.clone(),
                    to_columns: fk.referenced_columns.clone(),
                })
                .collect(),
            out_relationships: Vec::new(),
            in_relationships: Vec::new(),
            parent_entity: None,
            inheritance_level: 0,
            bag: None,
            is_aggregable_join_table: false,
            has_join_table_shape: false,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.primary_key
            .attributes
            .iter()
            .any(|k| k.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub ordinal_position: usize,
    /// Declared source type, e.g. `VARCHAR`.
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Key attribute names, in key order.
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub from_columns: Vec<String>,
    pub referenced_entity: String,
    pub to_columns: Vec<String>,
}
