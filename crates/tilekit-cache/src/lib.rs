//! Offline-capable asset cache for tilekit sessions.
//!
//! Tile bundles are served through the `tile-cache` virtual URL scheme.
//! Incoming request URLs are canonicalized to a `host:path` key so the
//! routing-only scheme prefix never fragments the key space. Entries carry
//! optional freshness timestamps; the precache merge rule guarantees the
//! cache never regresses to staler content while still accepting an
//! initial import with no provenance.
//!
//! The cache performs no network I/O itself: a miss delegates to an
//! [`UpstreamFetch`] collaborator and the result is cached before it is
//! returned.

pub mod cache;
pub mod entry;
pub mod error;

pub use cache::{AssetCache, UpstreamFetch, VIRTUAL_SCHEME, canonicalize};
pub use entry::{CacheEntry, PrecacheEntry};
pub use error::CacheError;
