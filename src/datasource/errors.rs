//! Boundary errors raised by catalog and store implementations.
//!
//! Both error types are terminal for the current run: the core does not
//! retry external failures; retry policy belongs to the caller.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("unknown source table `{table}`")]
    UnknownTable { table: String },

    #[error("unknown column `{column}` in source table `{table}`")]
    UnknownColumn { table: String, column: String },

    #[error("source backend error: {message}")]
    Backend { message: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("write rejected for `{class}`: {reason}")]
    WriteRejected { class: String, reason: String },

    #[error("graph store backend error: {message}")]
    Backend { message: String },
}
