use thiserror::Error;

/// Generation failures are build failures: fatal, never recoverable at
/// run time, and never degraded to an untyped passthrough.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid component schema: {0}")]
    InvalidSchema(#[from] serde_json::Error),

    #[error("unsupported property type at {path}: {detail}")]
    UnsupportedType { path: String, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GenerateError {
    pub fn unsupported(path: impl Into<String>, detail: impl Into<String>) -> Self {
        GenerateError::UnsupportedType {
            path: path.into(),
            detail: detail.into(),
        }
    }
}
