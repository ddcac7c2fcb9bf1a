use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("upstream fetch failed for {url}: {message}")]
    UpstreamFailed { url: String, message: String },

    #[error("asset not found in bundle: {0}")]
    AssetNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn upstream(url: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::UpstreamFailed {
            url: url.into(),
            message: message.into(),
        }
    }
}
