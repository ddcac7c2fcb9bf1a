use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// A cached response: metadata, payload bytes, and optional freshness.
///
/// `timestamp` records when the payload was produced. Entries without a
/// timestamp have unknown freshness: acceptable as a default, never
/// trusted for comparison during a precache merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_type: String,
    pub status: u16,
    pub body: Vec<u8>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn new(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            status: 200,
            body,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Load a bundled asset from disk.
    ///
    /// `relative` is resolved against `bundle_dir`; the payload is read
    /// eagerly so the entry can be handed to `precache` as-is.
    pub fn from_file(
        bundle_dir: &Path,
        relative: &str,
        content_type: impl Into<String>,
    ) -> Result<Self, CacheError> {
        let path = bundle_dir.join(relative);
        if !path.exists() {
            return Err(CacheError::AssetNotFound(relative.to_owned()));
        }
        let body = std::fs::read(&path)?;
        Ok(Self::new(content_type, body))
    }
}

/// A URL/entry pair supplied to `AssetCache::precache`.
#[derive(Debug, Clone)]
pub struct PrecacheEntry {
    pub url: String,
    pub entry: CacheEntry,
}

impl PrecacheEntry {
    pub fn new(url: impl Into<String>, entry: CacheEntry) -> Self {
        Self {
            url: url.into(),
            entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_file_reads_payload_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.js"), b"export default 1;").unwrap();

        let entry =
            CacheEntry::from_file(dir.path(), "index.js", "application/javascript").unwrap();
        assert_eq!(entry.body, b"export default 1;");
        assert_eq!(entry.content_type, "application/javascript");
        assert_eq!(entry.status, 200);
        assert!(entry.timestamp.is_none());
    }

    #[test]
    fn from_file_reports_missing_assets() {
        let dir = tempfile::tempdir().unwrap();
        let err = CacheEntry::from_file(dir.path(), "missing.css", "text/css").unwrap_err();
        assert!(matches!(err, CacheError::AssetNotFound(_)));
    }
}
