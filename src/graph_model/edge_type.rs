use serde::{Deserialize, Serialize};

use super::property::ModelProperty;
use super::VertexTypeId;
use crate::schema_model::{EntityId, RelationshipId};

/// Where an edge type came from; the import engine replays each kind in a
/// different phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Built from a canonical or logical relationship.
    Relationship,
    /// Built by aggregating a join table.
    JoinTable,
    /// Connects the partitions of a split entity.
    Splitting,
    /// Parent link inside a table-per-type hierarchy.
    HierarchyLink,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeType {
    pub name: String,
    /// Tail vertex type (the foreign side unless the relationship is
    /// inverse).
    pub out_vertex: VertexTypeId,
    /// Head vertex type.
    pub in_vertex: VertexTypeId,
    pub properties: Vec<ModelProperty>,
    pub kind: EdgeKind,
    pub source_relationship: Option<RelationshipId>,
    /// The join table or split entity this edge was derived from.
    pub source_entity: Option<EntityId>,
}
