//! One-call migration facade.
//!
//! [`Migrator::run`] drives the full pipeline: read the catalog, build the
//! schema model, map it to a graph model, replay the rows through the
//! import engine, and return a [`MigrationReport`]. Callers that need the
//! intermediate models drive the stages themselves; the facade covers the
//! common case.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::context::MigrationContext;
use crate::datasource::{GraphStore, SourceCatalog};
use crate::errors::MigrationError;
use crate::import_engine::ImportEngine;
use crate::model_builder::GraphModelBuilder;
use crate::schema_model::SchemaModel;
use crate::statistics::Statistics;

/// Outcome of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub statistics: Statistics,
    /// Vertex class names, in emission order.
    pub vertex_types: Vec<String>,
    /// Edge class names, in emission order.
    pub edge_types: Vec<String>,
}

pub struct Migrator {
    ctx: MigrationContext,
}

impl Migrator {
    pub fn new(ctx: MigrationContext) -> Self {
        Migrator { ctx }
    }

    pub fn with_defaults() -> Self {
        Migrator {
            ctx: MigrationContext::with_defaults(),
        }
    }

    pub fn context(&self) -> &MigrationContext {
        &self.ctx
    }

    pub fn run(
        &self,
        catalog: &dyn SourceCatalog,
        store: &dyn GraphStore,
    ) -> Result<MigrationReport, MigrationError> {
        self.run_with_cancel(catalog, store, Arc::new(AtomicBool::new(false)))
    }

    /// Like [`run`](Self::run), with a cancellation flag checked between
    /// rows.
    pub fn run_with_cancel(
        &self,
        catalog: &dyn SourceCatalog,
        store: &dyn GraphStore,
        cancel: Arc<AtomicBool>,
    ) -> Result<MigrationReport, MigrationError> {
        self.ctx.statistics_mut().mark_started();
        info!("migration started");

        let defs = catalog.entity_defs()?;
        let schema = SchemaModel::from_defs(defs, &self.ctx.config)?;
        let mut graph = GraphModelBuilder::build(&schema, &self.ctx)?;

        let mut engine = ImportEngine::new(&schema, &mut graph, &self.ctx, catalog, store)
            .with_cancel_flag(cancel);
        let outcome = engine.run();
        self.ctx.statistics_mut().mark_finished();
        outcome?;

        let report = MigrationReport {
            statistics: self.ctx.statistics_snapshot(),
            vertex_types: graph.vertices().map(|(_, v)| v.name.clone()).collect(),
            edge_types: graph.edges().map(|(_, e)| e.name.clone()).collect(),
        };
        let elapsed_ms = report
            .statistics
            .elapsed()
            .map_or(0, |d| d.num_milliseconds());
        info!(
            "migration finished in {elapsed_ms} ms: {} vertices created, {} edges created",
            report.statistics.created_vertices, report.statistics.created_edges
        );
        Ok(report)
    }
}
