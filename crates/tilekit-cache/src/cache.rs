use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::entry::{CacheEntry, PrecacheEntry};
use crate::error::CacheError;

/// Routing scheme for requests served from the cache.
pub const VIRTUAL_SCHEME: &str = "tile-cache";

/// External collaborator that fetches an asset when the cache misses.
///
/// The cache never performs network I/O itself; implementations decide how
/// the original resource is obtained.
pub trait UpstreamFetch: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CacheEntry, CacheError>> + Send + 'a>>;
}

/// Rewrite a request URL to the canonical `host:path` cache key.
///
/// The `tile-cache://` routing prefix and any inner scheme are stripped so
/// that a precached `https://cdn.example/bundle/index.js` and a runtime
/// request for `tile-cache://https://cdn.example/bundle/index.js` land on
/// the same slot. Already-canonical keys pass through unchanged.
pub fn canonicalize(url: &str) -> String {
    let mut rest = url;
    if let Some(stripped) = rest.strip_prefix("tile-cache://") {
        rest = stripped;
    }
    if let Some(pos) = rest.find("://")
        && !rest[..pos].contains('/')
    {
        rest = &rest[pos + 3..];
    }
    match rest.split_once('/') {
        Some((host, path)) => {
            // Already canonical: "host:" followed by the path.
            if let Some(colon_host) = host.strip_suffix(':') {
                format!("{colon_host}:/{path}")
            } else {
                format!("{host}:/{path}")
            }
        }
        None => rest.to_owned(),
    }
}

/// URL-keyed store of cached responses with freshness-aware merge
/// semantics.
///
/// Explicitly constructed and owned by its session controller (or a test
/// fixture); there is no ambient shared instance. Reads and writes are
/// safe under concurrent access from multiple in-flight requests; the lock
/// is never held across an upstream fetch.
pub struct AssetCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a cached entry by request URL.
    pub fn lookup(&self, url: &str) -> Option<CacheEntry> {
        let key = canonicalize(url);
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .get(&key)
            .cloned()
    }

    /// Insert an entry, replacing whatever the slot held.
    pub fn store(&self, url: &str, entry: CacheEntry) {
        let key = canonicalize(url);
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().expect("cache lock poisoned").is_empty()
    }

    /// Serve a request: cached entry on a hit, otherwise delegate to the
    /// upstream collaborator and cache the result before returning it.
    ///
    /// Upstream failure propagates to the caller and inserts nothing — the
    /// cache never holds a negative or partial entry.
    pub async fn reply(
        &self,
        url: &str,
        upstream: &dyn UpstreamFetch,
    ) -> Result<CacheEntry, CacheError> {
        let key = canonicalize(url);
        if let Some(hit) = self
            .entries
            .lock()
            .expect("cache lock poisoned")
            .get(&key)
            .cloned()
        {
            tracing::debug!(url, key, "Cache hit");
            return Ok(hit);
        }

        tracing::debug!(url, key, "Cache miss, delegating upstream");
        let fetched = upstream.fetch(url).await?;
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key, fetched.clone());
        Ok(fetched)
    }

    /// Merge precache entries and rewrite `base_url` so subsequent relative
    /// requests route through the virtual scheme.
    ///
    /// Merge rule, per slot: a new entry replaces an existing one only when
    /// both carry timestamps and the new one is strictly newer; a
    /// timestamp-less new entry never overwrites; a timestamp-less existing
    /// entry yields to any timestamped entry; an empty slot accepts
    /// anything. The base-URL rewrite is idempotent — precaching twice never
    /// double-prefixes.
    pub fn precache(&self, new_entries: Vec<PrecacheEntry>, base_url: &str) -> String {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        for new in new_entries {
            let key = canonicalize(&new.url);
            match entries.get(&key) {
                Some(existing) => {
                    let replace = match (existing.timestamp, new.entry.timestamp) {
                        (Some(old_ts), Some(new_ts)) => new_ts > old_ts,
                        (None, Some(_)) => true,
                        (_, None) => false,
                    };
                    if replace {
                        entries.insert(key, new.entry);
                    } else {
                        tracing::debug!(url = %new.url, "Precache entry not newer, keeping existing");
                    }
                }
                None => {
                    entries.insert(key, new.entry);
                }
            }
        }
        drop(entries);

        if base_url.starts_with("tile-cache://") {
            base_url.to_owned()
        } else {
            format!("{VIRTUAL_SCHEME}://{base_url}")
        }
    }
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new()
    }
}
