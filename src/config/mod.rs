//! Migration configuration model.
//!
//! Callers load a JSON document (file discovery and I/O are theirs) that
//! overrides the builder's default inference: vertex renames, entity
//! splitting partitions, per-property flags, edge naming and direction,
//! logical relationship declarations and aggregation-edge naming. An empty
//! configuration is valid and leaves every default in place.

mod errors;

#[cfg(test)]
mod config_tests;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use errors::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MigrationConfig {
    #[serde(default)]
    #[validate(nested)]
    pub vertices: Vec<VertexDirective>,

    #[serde(default)]
    #[validate(nested)]
    pub edges: Vec<EdgeDirective>,
}

/// Maps one source table (or one partition of it) to a vertex class.
///
/// Two or more directives naming the same `source_table` with `columns`
/// partitions declare entity splitting; the partitions must be disjoint
/// apart from the primary-key prefix each of them repeats.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VertexDirective {
    /// Target vertex class name, taken verbatim.
    #[validate(length(min = 1, message = "vertex name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "source table cannot be empty"))]
    pub source_table: String,

    /// Columns claimed by this partition (splitting only).
    #[serde(default)]
    pub columns: Option<Vec<String>>,

    /// Per-property overrides, keyed by source column name.
    #[serde(default)]
    pub properties: HashMap<String, PropertyDirective>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDirective {
    /// Excluded columns produce no property at all.
    #[serde(default = "default_true")]
    pub include: bool,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub not_null: bool,
    /// Target property name, bypassing the name resolver.
    #[serde(default)]
    pub rename: Option<String>,
}

impl Default for PropertyDirective {
    fn default() -> Self {
        PropertyDirective {
            include: true,
            mandatory: false,
            read_only: false,
            not_null: false,
            rename: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    #[default]
    Direct,
    Inverse,
}

/// Names or declares one edge. The populated fields select the meaning:
///
/// * `source_table` + `from_columns`: renames/redirects the edge built
///   from that foreign key.
/// * `source_table` only: names the aggregation edge of that join table.
/// * `source_table` + `to_vertex`: names one splitting edge of a split
///   table.
/// * `from_table` + `to_table` + column lists: declares a logical
///   relationship with no physical foreign key.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EdgeDirective {
    /// Target edge class name, taken verbatim.
    #[validate(length(min = 1, message = "edge name cannot be empty"))]
    pub name: String,

    #[serde(default)]
    pub source_table: Option<String>,

    #[serde(default)]
    pub to_vertex: Option<String>,

    #[serde(default)]
    pub from_table: Option<String>,
    #[serde(default)]
    pub to_table: Option<String>,

    #[serde(default)]
    pub from_columns: Vec<String>,
    #[serde(default)]
    pub to_columns: Vec<String>,

    #[serde(default)]
    pub direction: EdgeDirection,

    /// Per-property overrides for edge properties (aggregation and
    /// splitting edges), keyed by source column name.
    #[serde(default)]
    pub properties: HashMap<String, PropertyDirective>,
}

impl MigrationConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: MigrationConfig = serde_json::from_str(raw)?;
        config.validate()?;
        config.validate_consistency()?;
        Ok(config)
    }

    /// Cross-field rules the derive cannot express.
    pub fn validate_consistency(&self) -> Result<(), ConfigError> {
        for edge in &self.edges {
            let logical = edge.from_table.is_some() || edge.to_table.is_some();
            if logical {
                if edge.from_table.is_none() || edge.to_table.is_none() {
                    return Err(ConfigError::Inconsistent {
                        element: edge.name.clone(),
                        reason: "logical edges need both from_table and to_table".into(),
                    });
                }
                if edge.from_columns.is_empty() || edge.from_columns.len() != edge.to_columns.len()
                {
                    return Err(ConfigError::Inconsistent {
                        element: edge.name.clone(),
                        reason: "from_columns and to_columns must be non-empty and of equal length"
                            .into(),
                    });
                }
            } else if edge.source_table.is_none() {
                return Err(ConfigError::Inconsistent {
                    element: edge.name.clone(),
                    reason: "an edge needs either source_table or from_table/to_table".into(),
                });
            } else if !edge.from_columns.is_empty()
                && !edge.to_columns.is_empty()
                && edge.from_columns.len() != edge.to_columns.len()
            {
                return Err(ConfigError::Inconsistent {
                    element: edge.name.clone(),
                    reason: "from_columns and to_columns must have equal length".into(),
                });
            }
        }

        // Split partitions of one table must not claim the same non-key
        // column twice; full disjointness against the key prefix is checked
        // by the builder, which knows the primary key.
        let mut split_tables: HashMap<String, usize> = HashMap::new();
        for vertex in &self.vertices {
            if vertex.columns.is_some() {
                *split_tables
                    .entry(vertex.source_table.to_lowercase())
                    .or_default() += 1;
            }
        }
        for (table, count) in split_tables {
            if count < 2 {
                return Err(ConfigError::Inconsistent {
                    element: table,
                    reason: "splitting needs at least two partitions with explicit columns".into(),
                });
            }
        }
        Ok(())
    }

    /// Directives mapping `table`, in declaration order.
    pub fn vertex_directives_for_table(&self, table: &str) -> Vec<&VertexDirective> {
        self.vertices
            .iter()
            .filter(|v| v.source_table.eq_ignore_ascii_case(table))
            .collect()
    }

    /// The single rename directive for `table`, if it is not split.
    pub fn vertex_rename(&self, table: &str) -> Option<&VertexDirective> {
        let directives = self.vertex_directives_for_table(table);
        match directives.as_slice() {
            [single] if single.columns.is_none() => Some(single),
            _ => None,
        }
    }

    pub fn is_split_table(&self, table: &str) -> bool {
        self.vertex_directives_for_table(table)
            .iter()
            .filter(|v| v.columns.is_some())
            .count()
            > 1
    }

    /// Property override for a column, searched across the table's vertex
    /// directives.
    pub fn property_directive(&self, table: &str, column: &str) -> Option<&PropertyDirective> {
        self.vertices
            .iter()
            .filter(|v| v.source_table.eq_ignore_ascii_case(table))
            .find_map(|v| {
                v.properties
                    .iter()
                    .find(|(c, _)| c.eq_ignore_ascii_case(column))
                    .map(|(_, d)| d)
            })
    }

    /// Override for the edge built from a foreign key of `table` over
    /// `columns`.
    pub fn edge_for_foreign_key(&self, table: &str, columns: &[String]) -> Option<&EdgeDirective> {
        self.edges.iter().find(|e| {
            e.from_table.is_none()
                && e.to_vertex.is_none()
                && e.source_table
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(table))
                && !e.from_columns.is_empty()
                && columns_match(&e.from_columns, columns)
        })
    }

    /// Naming directive for the aggregation edge of a join table.
    pub fn edge_for_join_table(&self, table: &str) -> Option<&EdgeDirective> {
        self.edges.iter().find(|e| {
            e.from_table.is_none()
                && e.to_vertex.is_none()
                && e.from_columns.is_empty()
                && e.source_table
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(table))
        })
    }

    /// Explicit splitting-edge directives for a split table.
    pub fn splitting_edges_for_table(&self, table: &str) -> Vec<&EdgeDirective> {
        self.edges
            .iter()
            .filter(|e| {
                e.to_vertex.is_some()
                    && e.source_table
                        .as_deref()
                        .is_some_and(|t| t.eq_ignore_ascii_case(table))
            })
            .collect()
    }

    /// Directives declaring logical relationships.
    pub fn logical_edges(&self) -> impl Iterator<Item = &EdgeDirective> {
        self.edges
            .iter()
            .filter(|e| e.from_table.is_some() && e.to_table.is_some())
    }

    /// Edge-property override for a column of an aggregation or splitting
    /// edge.
    pub fn edge_property_directive(
        &self,
        table: &str,
        column: &str,
    ) -> Option<&PropertyDirective> {
        self.edges
            .iter()
            .filter(|e| {
                e.source_table
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(table))
            })
            .find_map(|e| {
                e.properties
                    .iter()
                    .find(|(c, _)| c.eq_ignore_ascii_case(column))
                    .map(|(_, d)| d)
            })
    }
}

fn columns_match(a: &[String], b: &[String]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}
