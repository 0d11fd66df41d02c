//! In-memory model of the target property graph.
//!
//! Vertex and edge types live in arenas owned by [`GraphModel`], shared by
//! index between the builder and the import engine. After the build phase
//! the model is read-only except for the per-vertex-type
//! `analyzed_in_last_migration` marker.

pub mod edge_type;
pub mod property;
pub mod vertex_type;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema_model::{EntityId, RelationshipId};

pub use edge_type::{EdgeKind, EdgeType};
pub use property::{CoercionError, ModelProperty, PropertyType};
pub use vertex_type::VertexType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexTypeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeTypeId(pub usize);

#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    vertices: Vec<VertexType>,
    edges: Vec<EdgeType>,
    /// Vertex types emitted for an entity, in emission order. One entry for
    /// the 1:1 mapping, several for a split entity, none for an aggregated
    /// join table.
    bindings: HashMap<EntityId, Vec<VertexTypeId>>,
    edge_by_relationship: HashMap<RelationshipId, EdgeTypeId>,
}

impl GraphModel {
    pub fn add_vertex(&mut self, vertex: VertexType) -> VertexTypeId {
        let id = VertexTypeId(self.vertices.len());
        if let Some(entity) = vertex.source_entity {
            self.bindings.entry(entity).or_default().push(id);
        }
        self.vertices.push(vertex);
        id
    }

    pub fn add_edge(&mut self, edge: EdgeType) -> EdgeTypeId {
        let id = EdgeTypeId(self.edges.len());
        if let Some(rel) = edge.source_relationship {
            self.edge_by_relationship.insert(rel, id);
        }
        self.edges.push(edge);
        id
    }

    pub fn vertex(&self, id: VertexTypeId) -> &VertexType {
        &self.vertices[id.0]
    }

    pub fn vertex_mut(&mut self, id: VertexTypeId) -> &mut VertexType {
        &mut self.vertices[id.0]
    }

    pub fn edge(&self, id: EdgeTypeId) -> &EdgeType {
        &self.edges[id.0]
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexTypeId, &VertexType)> {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (VertexTypeId(i), v))
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeTypeId, &EdgeType)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| (EdgeTypeId(i), e))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Properties of a vertex type together with everything it inherits
    /// through `parent_type`, own properties first. A name declared on the
    /// subtype shadows the ancestor's.
    pub fn property_chain(&self, id: VertexTypeId) -> Vec<ModelProperty> {
        let mut chain = self.vertex(id).properties.clone();
        let mut cursor = self.vertex(id).parent_type;
        while let Some(parent_id) = cursor {
            let parent = self.vertex(parent_id);
            for property in &parent.properties {
                if chain.iter().all(|p| p.name != property.name) {
                    chain.push(property.clone());
                }
            }
            cursor = parent.parent_type;
        }
        chain
    }

    /// Vertex types bound to an entity, in emission order.
    pub fn vertices_for_entity(&self, entity: EntityId) -> &[VertexTypeId] {
        self.bindings
            .get(&entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vertex_by_name(&self, name: &str) -> Option<VertexTypeId> {
        self.vertices
            .iter()
            .position(|v| v.name == name)
            .map(VertexTypeId)
    }

    pub fn edge_for_relationship(&self, rel: RelationshipId) -> Option<EdgeTypeId> {
        self.edge_by_relationship.get(&rel).copied()
    }

    /// Edges of a given kind attached to a source entity (aggregation and
    /// splitting edges), in emission order.
    pub fn edges_for_entity(
        &self,
        entity: EntityId,
        kind: EdgeKind,
    ) -> impl Iterator<Item = (EdgeTypeId, &EdgeType)> {
        self.edges().filter(move |(_, e)| {
            e.kind == kind && e.source_entity == Some(entity)
        })
    }
}
