use thiserror::Error;
use tilekit_codec::EncodeError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to encode properties: {0}")]
    Encode(#[from] EncodeError),

    /// The script runtime failed to evaluate the injected document. The
    /// prior ready session, if any, is preserved.
    #[error("script runtime failed to load the document: {0}")]
    Load(String),

    /// The in-place update entry point failed. Recovered internally by
    /// falling back to a full reinitialization; callers only see this if
    /// the fallback fails too.
    #[error("in-place update failed: {0}")]
    UpdateFailed(String),
}
