//! Fatal errors raised while mapping the schema model to a graph model.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelBuilderError {
    #[error("directive for `{entity}` names unknown column `{column}`")]
    UnknownColumn { entity: String, column: String },

    #[error("split of `{entity}` produced {edges} splitting edges for {vertices} vertices")]
    SplittingEdgeCountMismatch {
        entity: String,
        vertices: usize,
        edges: usize,
    },

    #[error("invalid split of `{entity}`: {reason}")]
    InvalidSplitting { entity: String, reason: String },

    #[error("invalid directive `{name}`: {reason}")]
    InvalidDirective { name: String, reason: String },

    #[error("no vertex type was built for `{entity}`")]
    MissingVertex { entity: String },
}
