use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("non-finite number cannot be encoded: {0}")]
    NonFiniteNumber(f64),

    #[error("value nesting exceeds the depth limit of {0}")]
    DepthLimitExceeded(usize),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure raised by a host callable while servicing a script-side call.
///
/// Carries a message only; the bridge reports it through the session's
/// error channel alongside script-side runtime errors.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        CallbackError(message.into())
    }
}

impl From<serde_json::Error> for CallbackError {
    fn from(err: serde_json::Error) -> Self {
        CallbackError(format!("invalid callback payload: {err}"))
    }
}
