use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse migration configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid migration configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("inconsistent directive `{element}`: {reason}")]
    Inconsistent { element: String, reason: String },
}
