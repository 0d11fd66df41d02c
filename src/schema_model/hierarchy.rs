//! Inheritance trees of the source schema.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::EntityId;

/// The three SQL inheritance encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InheritancePattern {
    /// One physical table for the whole tree, rows told apart by a
    /// discriminator column.
    #[serde(alias = "table-per-hierarchy")]
    PerHierarchy,
    /// One table per type; subclass tables carry a foreign key back to the
    /// root (also known as table-per-subclass).
    #[serde(alias = "table-per-type", alias = "table-per-subclass")]
    PerType,
    /// One complete table per concrete type.
    #[serde(alias = "table-per-concrete-type")]
    PerConcreteType,
}

/// The entities realizing one inheritance tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchicalBag {
    /// Root entity name.
    pub name: String,
    pub root: EntityId,
    pub pattern: InheritancePattern,
    /// Entities grouped by inheritance depth; index 0 holds the root.
    pub depth_levels: Vec<Vec<EntityId>>,
    /// Table-per-hierarchy only.
    pub discriminator_column: Option<String>,
    /// Entity name -> discriminator value (table-per-hierarchy only).
    pub discriminator_values: HashMap<String, String>,
}

impl HierarchicalBag {
    /// Members from the deepest subclass up to the root. Both the import
    /// order and the physical-lookup resolution walk use this order.
    pub fn entities_deepest_first(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.depth_levels
            .iter()
            .rev()
            .flat_map(|level| level.iter().copied())
    }

    /// Maps a discriminator value read from a row back to the entity name
    /// it selects.
    pub fn entity_for_discriminator(&self, value: &str) -> Option<&str> {
        self.discriminator_values
            .iter()
            .find(|(_, v)| v.as_str() == value)
            .map(|(name, _)| name.as_str())
    }

    pub fn discriminator_value_of(&self, entity_name: &str) -> Option<&str> {
        self.discriminator_values.get(entity_name).map(String::as_str)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.depth_levels.iter().any(|level| level.contains(&id))
    }
}
