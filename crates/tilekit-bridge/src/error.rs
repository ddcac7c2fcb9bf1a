use thiserror::Error;
use tilekit_codec::CallbackError;

use crate::id::CallbackId;

#[derive(Debug, Error)]
pub enum CallDispatchError {
    #[error("callback identifier is malformed: {0:?}")]
    InvalidIdentifier(String),

    /// The identifier is not present in the current session. Always treated
    /// as "session superseded" and never retried.
    #[error("callback {0} does not belong to the current session")]
    SessionSuperseded(CallbackId),

    /// A second blocking call arrived while one was already in flight. The
    /// script runtime is single-threaded, so this cannot occur unless the
    /// runtime violates its execution model.
    #[error("blocking call {0} arrived while another blocking call was in flight")]
    ReentrantBlockingCall(CallbackId),

    #[error("callback {id} failed: {source}")]
    CallbackFailed {
        id: CallbackId,
        #[source]
        source: CallbackError,
    },
}
