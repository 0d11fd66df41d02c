//! Relational-to-graph migration core.
//!
//! Graphport turns a relational schema and its rows into a property graph:
//! tables become vertex classes, foreign keys become edge classes, join
//! tables collapse into edges, one table can split into several vertex
//! classes, and SQL inheritance trees are mirrored as vertex-type
//! hierarchies.
//!
//! The crate owns the models and the pipeline; talking to an actual
//! database or graph store happens through the [`datasource`] traits the
//! caller implements. A run is three stages, drivable one by one or
//! through the [`migration::Migrator`] facade:
//!
//! 1. [`schema_model::SchemaModel::from_defs`] builds the relational model
//!    from raw catalog records,
//! 2. [`model_builder::GraphModelBuilder::build`] maps it to a
//!    [`graph_model::GraphModel`],
//! 3. [`import_engine::ImportEngine::run`] replays the source rows as
//!    vertex and edge upserts.

pub mod config;
pub mod context;
pub mod datasource;
pub mod errors;
pub mod graph_model;
pub mod hierarchy_resolver;
pub mod import_engine;
pub mod migration;
pub mod model_builder;
pub mod schema_model;
pub mod statistics;

pub use config::MigrationConfig;
pub use context::MigrationContext;
pub use errors::MigrationError;
pub use migration::{MigrationReport, Migrator};
pub use statistics::Statistics;
