//! In-memory catalog and store doubles shared by the test modules.

use std::cell::RefCell;
use std::collections::HashMap;

use super::catalog::{EntityDef, Row, RowCursor, SourceCatalog, SqlValue};
use super::errors::{CatalogError, StoreError};
use super::graph_store::{GraphStore, VertexHandle, VertexUpsert};

/// Builds a row from column/value pairs.
pub fn row(pairs: &[(&str, SqlValue)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A catalog backed by vectors of rows.
#[derive(Default)]
pub struct InMemoryCatalog {
    defs: Vec<EntityDef>,
    /// Lowercased table name -> rows in insertion order.
    tables: HashMap<String, Vec<Row>>,
}

impl InMemoryCatalog {
    pub fn new(defs: Vec<EntityDef>) -> Self {
        InMemoryCatalog {
            defs,
            tables: HashMap::new(),
        }
    }

    pub fn insert_rows(&mut self, table: &str, rows: Vec<Row>) {
        self.tables
            .entry(table.to_lowercase())
            .or_default()
            .extend(rows);
    }

    fn rows_of(&self, table: &str) -> Result<&[Row], CatalogError> {
        let known = self
            .defs
            .iter()
            .any(|d| d.name.eq_ignore_ascii_case(table));
        if !known {
            return Err(CatalogError::UnknownTable {
                table: table.to_string(),
            });
        }
        Ok(self
            .tables
            .get(&table.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }
}

struct VecCursor {
    rows: std::vec::IntoIter<Row>,
}

impl RowCursor for VecCursor {
    fn next_row(&mut self) -> Result<Option<Row>, CatalogError> {
        Ok(self.rows.next())
    }
}

fn row_value<'r>(row: &'r Row, column: &str) -> Option<&'r SqlValue> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    })
}

impl SourceCatalog for InMemoryCatalog {
    fn entity_defs(&self) -> Result<Vec<EntityDef>, CatalogError> {
        Ok(self.defs.clone())
    }

    fn stream_rows(&self, table: &str) -> Result<Box<dyn RowCursor + '_>, CatalogError> {
        let rows = self.rows_of(table)?.to_vec();
        Ok(Box::new(VecCursor {
            rows: rows.into_iter(),
        }))
    }

    fn stream_rows_where(
        &self,
        table: &str,
        column: &str,
        value: &SqlValue,
    ) -> Result<Box<dyn RowCursor + '_>, CatalogError> {
        let rows: Vec<Row> = self
            .rows_of(table)?
            .iter()
            .filter(|r| row_value(r, column) == Some(value))
            .cloned()
            .collect();
        Ok(Box::new(VecCursor {
            rows: rows.into_iter(),
        }))
    }

    fn lookup_by_key(
        &self,
        table: &str,
        key_columns: &[String],
        key_values: &[SqlValue],
    ) -> Result<Option<Row>, CatalogError> {
        let hit = self.rows_of(table)?.iter().find(|r| {
            key_columns.len() == key_values.len()
                && key_columns
                    .iter()
                    .zip(key_values)
                    .all(|(c, v)| row_value(r, c) == Some(v))
        });
        Ok(hit.cloned())
    }
}

#[derive(Debug, Clone)]
pub struct StoredVertex {
    pub class: String,
    /// Key property values, in key order.
    pub key: Vec<(String, SqlValue)>,
    pub props: HashMap<String, SqlValue>,
}

#[derive(Debug, Clone)]
pub struct StoredEdge {
    pub class: String,
    pub out: VertexHandle,
    pub r#in: VertexHandle,
    pub props: HashMap<String, SqlValue>,
}

#[derive(Default)]
struct StoreInner {
    vertices: Vec<StoredVertex>,
    edges: Vec<StoredEdge>,
    /// Groups of class names whose keys are matched together.
    hierarchies: Vec<Vec<String>>,
}

impl StoreInner {
    fn related(&self, a: &str, b: &str) -> bool {
        a == b
            || self
                .hierarchies
                .iter()
                .any(|g| g.iter().any(|c| c == a) && g.iter().any(|c| c == b))
    }

    fn find(&self, class: &str, key: &[(String, SqlValue)]) -> Option<usize> {
        self.vertices.iter().position(|v| {
            self.related(&v.class, class)
                && v.key.len() == key.len()
                && v.key
                    .iter()
                    .zip(key)
                    .all(|((_, stored), (_, probed))| stored == probed)
        })
    }
}

/// A store keeping vertices and edges in vectors, with value-based key
/// matching across registered class hierarchies.
#[derive(Default)]
pub struct InMemoryGraphStore {
    inner: RefCell<StoreInner>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a group of vertex classes whose natural keys identify the
    /// same logical records.
    pub fn register_hierarchy(&self, classes: &[&str]) {
        self.inner
            .borrow_mut()
            .hierarchies
            .push(classes.iter().map(|c| c.to_string()).collect());
    }

    pub fn vertex_count(&self) -> usize {
        self.inner.borrow().vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.borrow().edges.len()
    }

    pub fn count_vertices(&self, class: &str) -> usize {
        self.inner
            .borrow()
            .vertices
            .iter()
            .filter(|v| v.class == class)
            .count()
    }

    pub fn count_edges(&self, class: &str) -> usize {
        self.inner
            .borrow()
            .edges
            .iter()
            .filter(|e| e.class == class)
            .count()
    }

    pub fn find_vertex(&self, class: &str, key: &[(String, SqlValue)]) -> Option<StoredVertex> {
        let inner = self.inner.borrow();
        inner.find(class, key).map(|i| inner.vertices[i].clone())
    }

    pub fn edges_of(&self, class: &str) -> Vec<StoredEdge> {
        self.inner
            .borrow()
            .edges
            .iter()
            .filter(|e| e.class == class)
            .cloned()
            .collect()
    }

    pub fn vertex_at(&self, handle: VertexHandle) -> StoredVertex {
        self.inner.borrow().vertices[handle.0 as usize].clone()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn upsert_vertex(
        &self,
        vertex_type: &str,
        key: &[(String, SqlValue)],
        props: &[(String, SqlValue)],
    ) -> Result<VertexUpsert, StoreError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(i) = inner.find(vertex_type, key) {
            let vertex = &mut inner.vertices[i];
            for (name, value) in props {
                vertex.props.entry(name.clone()).or_insert_with(|| value.clone());
            }
            return Ok(VertexUpsert {
                handle: VertexHandle(i as u64),
                created: false,
            });
        }
        let handle = VertexHandle(inner.vertices.len() as u64);
        inner.vertices.push(StoredVertex {
            class: vertex_type.to_string(),
            key: key.to_vec(),
            props: props.iter().cloned().collect(),
        });
        Ok(VertexUpsert {
            handle,
            created: true,
        })
    }

    fn upsert_edge(
        &self,
        edge_type: &str,
        out: VertexHandle,
        r#in: VertexHandle,
        props: &[(String, SqlValue)],
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let exists = inner
            .edges
            .iter()
            .any(|e| e.class == edge_type && e.out == out && e.r#in == r#in);
        if exists {
            return Ok(false);
        }
        inner.edges.push(StoredEdge {
            class: edge_type.to_string(),
            out,
            r#in,
            props: props.iter().cloned().collect(),
        });
        Ok(true)
    }
}
