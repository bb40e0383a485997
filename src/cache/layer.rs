//! Cache layer that orchestrates caching logic with network fetching.

use color_eyre::Result;
use std::future::Future;

use super::local::LocalCache;
use super::traits::{CacheResult, Cacheable};

/// Fetch-and-cache for whole collections.
///
/// Inserts rewrite the cached collection in place; deletes invalidate it so
/// the next read goes back to the data store.
#[derive(Clone)]
pub struct CollectionCache {
  local: LocalCache,
}

impl CollectionCache {
  pub fn new(local: LocalCache) -> Self {
    Self { local }
  }

  /// The underlying freshness-bounded cache.
  pub fn local(&self) -> &LocalCache {
    &self.local
  }

  /// Fetch a list with cache-first strategy.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, fetch from network
  /// 3. Update cache with new data
  ///
  /// A failed fetch is returned as is and leaves the cache untouched.
  pub async fn fetch_list<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    if let Some(cached) = self.local.read::<T>(key) {
      return Ok(CacheResult::from_cache(cached));
    }

    let data = fetcher().await?;
    self.local.write(key, &data);
    Ok(CacheResult::from_network(data))
  }

  /// Fold a newly inserted record into the cached collection.
  ///
  /// A record with the same key is replaced in place; otherwise the record
  /// goes first (newest). Nothing is written when there is no fresh entry to
  /// update.
  pub fn record_inserted<T: Cacheable>(&self, key: &str, record: T) {
    let Some(mut records) = self.local.read::<T>(key) else {
      return;
    };

    let record_key = record.cache_key();
    match records.iter_mut().find(|r| r.cache_key() == record_key) {
      Some(existing) => *existing = record,
      None => records.insert(0, record),
    }

    self.local.write(key, &records);
  }

  /// Invalidate the cached collection after a record was deleted.
  pub fn record_deleted(&self, key: &str) {
    self.local.remove(key);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;
  use crate::cache::local::CacheSettings;
  use crate::cache::storage::SqliteStorage;
  use crate::cache::traits::CacheSource;
  use chrono::{Duration, Utc};
  use color_eyre::eyre::eyre;
  use serde::{Deserialize, Serialize};
  use std::sync::Arc;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Row {
    id: u32,
    name: String,
  }

  impl Cacheable for Row {
    fn cache_key(&self) -> String {
      self.id.to_string()
    }
  }

  fn row(id: u32, name: &str) -> Row {
    Row {
      id,
      name: name.to_string(),
    }
  }

  fn setup() -> (CollectionCache, Arc<ManualClock>) {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let local = LocalCache::new(storage, clock.clone(), CacheSettings::default());
    (CollectionCache::new(local), clock)
  }

  #[tokio::test]
  async fn test_first_fetch_goes_to_network_then_cache() {
    let (cache, _) = setup();

    let first = cache
      .fetch_list("rows", || async { Ok(vec![row(1, "a")]) })
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = cache
      .fetch_list::<Row, _, _>("rows", || async { Err(eyre!("should not be called")) })
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, vec![row(1, "a")]);
  }

  #[tokio::test]
  async fn test_stale_cache_refetches() {
    let (cache, clock) = setup();
    cache
      .fetch_list("rows", || async { Ok(vec![row(1, "a")]) })
      .await
      .unwrap();

    clock.advance(Duration::hours(2));

    let result = cache
      .fetch_list("rows", || async { Ok(vec![row(2, "b")]) })
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, vec![row(2, "b")]);
  }

  #[tokio::test]
  async fn test_failed_fetch_propagates_and_caches_nothing() {
    let (cache, _) = setup();

    let result = cache
      .fetch_list::<Row, _, _>("rows", || async { Err(eyre!("offline")) })
      .await;
    assert!(result.is_err());
    assert_eq!(cache.local().read::<Row>("rows"), None);
  }

  #[tokio::test]
  async fn test_insert_prepends_and_upserts() {
    let (cache, _) = setup();
    cache
      .fetch_list("rows", || async { Ok(vec![row(1, "a"), row(2, "b")]) })
      .await
      .unwrap();

    cache.record_inserted("rows", row(3, "c"));
    cache.record_inserted("rows", row(2, "b2"));

    assert_eq!(
      cache.local().read::<Row>("rows"),
      Some(vec![row(3, "c"), row(1, "a"), row(2, "b2")])
    );
  }

  #[test]
  fn test_insert_without_cached_collection_writes_nothing() {
    let (cache, _) = setup();
    cache.record_inserted("rows", row(1, "a"));

    assert_eq!(cache.local().read::<Row>("rows"), None);
  }

  #[tokio::test]
  async fn test_delete_invalidates() {
    let (cache, _) = setup();
    cache
      .fetch_list("rows", || async { Ok(vec![row(1, "a")]) })
      .await
      .unwrap();

    cache.record_deleted("rows");
    cache.record_deleted("rows");

    assert_eq!(cache.local().read::<Row>("rows"), None);
  }
}
