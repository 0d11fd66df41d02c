//! Relationships between entities.
//!
//! `from_columns[i]` always corresponds positionally to `to_columns[i]`.

use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::config::EdgeDirection;

/// Edge orientation relative to the foreign key: `Direct` points from the
/// FK-owning entity to the referenced entity, `Inverse` swaps the ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Direct,
    Inverse,
}

impl From<EdgeDirection> for Direction {
    fn from(d: EdgeDirection) -> Self {
        match d {
            EdgeDirection::Direct => Direction::Direct,
            EdgeDirection::Inverse => Direction::Inverse,
        }
    }
}

/// Relationship backed by a declared foreign key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRelationship {
    pub name: String,
    /// FK-owning side.
    pub foreign_entity: EntityId,
    /// Referenced side.
    pub parent_entity: EntityId,
    pub from_columns: Vec<String>,
    pub to_columns: Vec<String>,
    pub direction: Direction,
}

/// Relationship declared only through configuration, with no physical
/// foreign key behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalRelationship {
    pub name: String,
    pub foreign_entity: EntityId,
    pub parent_entity: EntityId,
    pub from_columns: Vec<String>,
    pub to_columns: Vec<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Relationship {
    Canonical(CanonicalRelationship),
    Logical(LogicalRelationship),
}

impl Relationship {
    pub fn name(&self) -> &str {
        match self {
            Relationship::Canonical(r) => &r.name,
            Relationship::Logical(r) => &r.name,
        }
    }

    pub fn foreign_entity(&self) -> EntityId {
        match self {
            Relationship::Canonical(r) => r.foreign_entity,
            Relationship::Logical(r) => r.foreign_entity,
        }
    }

    pub fn parent_entity(&self) -> EntityId {
        match self {
            Relationship::Canonical(r) => r.parent_entity,
            Relationship::Logical(r) => r.parent_entity,
        }
    }

    pub fn from_columns(&self) -> &[String] {
        match self {
            Relationship::Canonical(r) => &r.from_columns,
            Relationship::Logical(r) => &r.from_columns,
        }
    }

    pub fn to_columns(&self) -> &[String] {
        match self {
            Relationship::Canonical(r) => &r.to_columns,
            Relationship::Logical(r) => &r.to_columns,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Relationship::Canonical(r) => r.direction,
            Relationship::Logical(r) => r.direction,
        }
    }
}
