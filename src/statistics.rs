//! Running counters of one migration run.
//!
//! Incremented by the builder and the import engine, read by callers for
//! reporting. Nothing in the core branches on these values.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    pub detected_entities: u64,
    pub detected_relationships: u64,
    pub built_vertex_types: u64,
    pub built_edge_types: u64,

    pub scanned_rows: u64,
    pub created_vertices: u64,
    /// Upsert lookups that found an existing vertex.
    pub existing_vertices: u64,
    pub created_edges: u64,
    pub skipped_rows: u64,
    pub unresolved_relationships: u64,
    /// Distinct source rows that collapsed onto an already-created natural
    /// key through splitting or aggregation.
    pub duplicate_key_hits: u64,
    pub warnings: u64,
}

impl Statistics {
    pub fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn mark_finished(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}
