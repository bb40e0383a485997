//! Best-effort local cache for fetched collections.
//!
//! This module provides:
//! - A key/value storage slot with a storage-level expiry (SQLite backed)
//! - A freshness window on top of it: entries older than the window are
//!   treated as absent and removed on read
//! - Fetch-and-cache orchestration for whole collections
//!
//! Nothing in here returns an error for a storage or parse failure; those
//! are logged and degrade to a cache miss.

mod clock;
mod layer;
mod local;
mod storage;
mod traits;

pub use clock::SystemClock;
pub use layer::CollectionCache;
pub use local::{CacheSettings, LocalCache};
pub use storage::{KeyValueStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable};
