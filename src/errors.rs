//! Top-level error type of a migration run.

use thiserror::Error;

use crate::config::ConfigError;
use crate::datasource::CatalogError;
use crate::import_engine::ImportError;
use crate::model_builder::ModelBuilderError;
use crate::schema_model::SchemaModelError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Schema(#[from] SchemaModelError),

    #[error(transparent)]
    Build(#[from] ModelBuilderError),

    #[error(transparent)]
    Import(#[from] ImportError),
}
