//! Graph store collaborator.

use super::catalog::SqlValue;
use super::errors::StoreError;

/// Opaque identity of a vertex in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexHandle(pub u64);

/// Result of a vertex upsert: the existing-or-created vertex plus whether
/// this call created it.
#[derive(Debug, Clone, Copy)]
pub struct VertexUpsert {
    pub handle: VertexHandle,
    pub created: bool,
}

/// Write access to the target property graph.
///
/// Key matching is by natural-key values within the vertex type's
/// inheritance hierarchy: an upsert against a type must also see vertices
/// of its sub- and supertypes carrying the same key values. This is what
/// lets a placeholder created from a foreign key be found again when the
/// referenced row is imported under a more specific type, and what makes
/// the upsert itself the one existence check a row import needs.
#[cfg_attr(test, mockall::automock)]
pub trait GraphStore {
    /// Look up a vertex of `vertex_type` by `key`; create it with `props`
    /// if absent. An existing vertex keeps its current property values, and
    /// properties it does not yet carry are filled from `props`.
    fn upsert_vertex(
        &self,
        vertex_type: &str,
        key: &[(String, SqlValue)],
        props: &[(String, SqlValue)],
    ) -> Result<VertexUpsert, StoreError>;

    /// Create the edge if no edge of `edge_type` between the two endpoints
    /// exists yet. Returns whether this call created it.
    fn upsert_edge(
        &self,
        edge_type: &str,
        out: VertexHandle,
        in_: VertexHandle,
        props: &[(String, SqlValue)],
    ) -> Result<bool, StoreError>;
}
