//! Caching module: the in-memory versioned cache and the local mirror.
//!
//! - `VersionedCache`: key → `{data, cached_at, version}` with TTL reads
//!   (5 minutes at startup, 60 minutes otherwise) and LRU eviction
//! - `LocalMirror`: a JSON copy of the user's records on local storage,
//!   used as the fallback when the remote store cannot be read

pub mod entry;
pub mod local;
pub mod versioned;

pub use entry::{CacheTtl, CachedData};
pub use local::{FileStore, KeyValueStore, LocalMirror, MemoryStore, MirrorAges};
pub use versioned::VersionedCache;
