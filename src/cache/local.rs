//! Freshness-bounded cache entries on top of a key/value storage.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::clock::Clock;
use super::storage::KeyValueStorage;

/// Timing knobs for [`LocalCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
  /// Entries older than this are stale and dropped on read
  pub freshness_window: Duration,
  /// Expiry handed to the storage itself, so unread entries still go away
  pub storage_ttl: Duration,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      freshness_window: Duration::hours(1),
      storage_ttl: Duration::days(1),
    }
  }
}

/// Stored form of a cached collection.
#[derive(Debug, Deserialize)]
struct CacheEntry<T> {
  payload: Vec<T>,
  stored_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct CacheEntryRef<'a, T> {
  payload: &'a [T],
  stored_at: DateTime<Utc>,
}

/// Cache that stores whole collections under a key and serves them back
/// only while they are fresh.
///
/// Every failure (storage, serialization, parsing) is logged and treated as
/// a miss. Writers are not coordinated: the last write wins.
#[derive(Clone)]
pub struct LocalCache {
  storage: Arc<dyn KeyValueStorage>,
  clock: Arc<dyn Clock>,
  settings: CacheSettings,
}

impl LocalCache {
  pub fn new(
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
  ) -> Self {
    Self {
      storage,
      clock,
      settings,
    }
  }

  /// Load the collection stored under `key` if it is still fresh.
  ///
  /// A stale entry is deleted before returning `None`. An entry exactly
  /// `freshness_window` old is still fresh.
  pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<Vec<T>> {
    let now = self.clock.now();

    let raw = match self.storage.get(key, now) {
      Ok(Some(raw)) => raw,
      Ok(None) => {
        debug!(key, "Cache miss");
        return None;
      }
      Err(e) => {
        warn!(key, error = %e, "Failed to read cache entry");
        return None;
      }
    };

    let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(key, error = %e, "Ignoring unreadable cache entry");
        return None;
      }
    };

    if now - entry.stored_at > self.settings.freshness_window {
      debug!(key, stored_at = %entry.stored_at, "Cache entry is stale");
      self.remove(key);
      return None;
    }

    debug!(key, records = entry.payload.len(), "Cache hit");
    Some(entry.payload)
  }

  /// Store `payload` under `key`, stamped with the current time.
  pub fn write<T: Serialize>(&self, key: &str, payload: &[T]) {
    let now = self.clock.now();
    let entry = CacheEntryRef {
      payload,
      stored_at: now,
    };

    let raw = match serde_json::to_string(&entry) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key, error = %e, "Failed to serialize cache entry");
        return;
      }
    };

    let Some(expires_at) = storage_expiry(now, self.settings.storage_ttl) else {
      warn!(key, "Failed to compute cache expiry");
      return;
    };

    if let Err(e) = self.storage.set(key, &raw, expires_at) {
      warn!(key, error = %e, "Failed to write cache entry");
    }
  }

  /// Drop whatever is stored under `key`.
  pub fn remove(&self, key: &str) {
    if let Err(e) = self.storage.remove(key) {
      warn!(key, error = %e, "Failed to remove cache entry");
    }
  }
}

/// `now + ttl`, capped at the end of year 9999.
///
/// Storage compares expiry timestamps as text, which only orders correctly
/// while the year has four digits.
fn storage_expiry(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
  let latest = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).single()?;
  match now.checked_add_signed(ttl) {
    Some(expires_at) if expires_at <= latest => Some(expires_at),
    _ => {
      warn!(ttl_secs = ttl.num_seconds(), "Cache TTL out of range, capping expiry");
      Some(latest)
    }
  }
}
