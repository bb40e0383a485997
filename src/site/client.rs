//! Site client with retried store calls and transparent collection caching.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{
  CacheResult, CollectionCache, KeyValueStorage, LocalCache, NoopStorage, SqliteStorage,
  SystemClock,
};
use crate::config::{CacheConfig, Config};
use crate::retry::{execute_with_retry, RetryPolicy};
use crate::store::{Query, StoreClient, StoreResponse};

use super::collection::Collection;
use super::types::{
  is_valid_email, Article, Image, NewImage, NewSubscriber, Profile, Submission,
};

const SUBSCRIBERS_TABLE: &str = "newsletter_subscribers";
const PROFILES_TABLE: &str = "profiles";

/// Outcome of a newsletter signup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subscription {
  Subscribed,
  AlreadySubscribed,
}

/// Client for the site's data.
///
/// Every database call goes through the retry executor. Whole collections
/// (images, articles, submissions) are cached; inserts update the cached
/// collection and deletes invalidate it.
#[derive(Clone)]
pub struct SiteClient {
  store: StoreClient,
  cache: CollectionCache,
  retry: RetryPolicy,
}

impl SiteClient {
  /// Create a client from configuration.
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    let store = StoreClient::new(&config.supabase.url, &api_key)?;
    let storage = open_storage(&config.cache)?;
    let local = LocalCache::new(storage, Arc::new(SystemClock), config.cache.settings());

    Ok(Self::from_parts(
      store,
      CollectionCache::new(local),
      config.retry.policy(),
    ))
  }

  pub fn from_parts(store: StoreClient, cache: CollectionCache, retry: RetryPolicy) -> Self {
    Self {
      store,
      cache,
      retry,
    }
  }

  pub fn cache(&self) -> &CollectionCache {
    &self.cache
  }

  /// Run a store call with retries and surface application-level errors.
  async fn request<T, F, Fut>(&self, operation: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<StoreResponse<T>>>,
  {
    let response = execute_with_retry(operation, &self.retry).await?;
    response.into_result()
  }

  async fn fetch_all<T: Collection>(&self) -> Result<Vec<T>> {
    let query = Query::on(T::TABLE).order(T::ORDER_BY, false);
    self.request(|| self.store.select::<T>(&query)).await
  }

  /// Full collection, served from cache while fresh.
  pub async fn list<T: Collection>(&self) -> Result<CacheResult<Vec<T>>> {
    let result = self
      .cache
      .fetch_list(T::CACHE_KEY, || self.fetch_all::<T>())
      .await?;
    debug!(table = T::TABLE, source = ?result.source, records = result.data.len(), "Loaded collection");
    Ok(result)
  }

  async fn insert_record<T, B>(&self, row: &B) -> Result<T>
  where
    T: Collection,
    B: Serialize,
  {
    let rows: Vec<T> = self
      .request(|| self.store.insert(T::TABLE, row))
      .await?;
    let created = rows
      .into_iter()
      .next()
      .ok_or_else(|| eyre!("Insert into {} returned no rows", T::TABLE))?;

    self.cache.record_inserted(T::CACHE_KEY, created.clone());
    info!(table = T::TABLE, id = %created.cache_key(), "Inserted record");
    Ok(created)
  }

  async fn delete_record<T: Collection>(&self, id: &str) -> Result<()> {
    let query = Query::on(T::TABLE).eq("id", id);
    self.request(|| self.store.delete(&query)).await?;

    self.cache.record_deleted(T::CACHE_KEY);
    info!(table = T::TABLE, id, "Deleted record");
    Ok(())
  }

  pub async fn list_images(&self) -> Result<CacheResult<Vec<Image>>> {
    self.list().await
  }

  /// Register an uploaded image by its durable URL.
  pub async fn add_image(&self, image: &NewImage) -> Result<Image> {
    if image.url.trim().is_empty() {
      return Err(eyre!("Image URL must not be empty"));
    }
    self.insert_record(image).await
  }

  pub async fn delete_image(&self, id: &str) -> Result<()> {
    self.delete_record::<Image>(id).await
  }

  /// Articles, newest first.
  ///
  /// The admin's full list is cached. The published-only view always asks
  /// the database.
  pub async fn list_articles(&self, published_only: bool) -> Result<Vec<Article>> {
    if !published_only {
      return Ok(self.list::<Article>().await?.data);
    }

    let query = Query::on(Article::TABLE)
      .eq("published", "true")
      .order(Article::ORDER_BY, false);
    self.request(|| self.store.select(&query)).await
  }

  pub async fn get_article(&self, slug: &str) -> Result<Article> {
    let query = Query::on(Article::TABLE).eq("slug", slug).limit(1);
    let articles: Vec<Article> = self.request(|| self.store.select(&query)).await?;

    articles
      .into_iter()
      .next()
      .ok_or_else(|| eyre!("Article {} not found", slug))
  }

  pub async fn list_submissions(&self) -> Result<CacheResult<Vec<Submission>>> {
    self.list().await
  }

  pub async fn delete_submission(&self, id: &str) -> Result<()> {
    self.delete_record::<Submission>(id).await
  }

  /// Add `email` to the newsletter list.
  ///
  /// Signing up twice is not an error.
  pub async fn subscribe_newsletter(&self, email: &str) -> Result<Subscription> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
      return Err(eyre!("Invalid email address: {}", email));
    }

    let row = NewSubscriber { email };
    let response: StoreResponse<Vec<serde_json::Value>> = execute_with_retry(
      || self.store.insert(SUBSCRIBERS_TABLE, &row),
      &self.retry,
    )
    .await?;

    if response.error().is_some_and(|e| e.is_conflict()) {
      info!(email = %row.email, "Already subscribed");
      return Ok(Subscription::AlreadySubscribed);
    }

    response.into_result()?;
    info!(email = %row.email, "Subscribed to newsletter");
    Ok(Subscription::Subscribed)
  }

  /// Load the profile for `user_id` and make sure it has the admin role.
  pub async fn require_admin(&self, user_id: &str) -> Result<Profile> {
    let query = Query::on(PROFILES_TABLE)
      .select("id,email,role")
      .eq("id", user_id)
      .limit(1);
    let profiles: Vec<Profile> = self.request(|| self.store.select(&query)).await?;

    let profile = profiles
      .into_iter()
      .next()
      .ok_or_else(|| eyre!("No profile for user {}", user_id))?;

    if !profile.is_admin() {
      return Err(eyre!("User {} is not an admin", user_id));
    }
    Ok(profile)
  }
}

fn open_storage(config: &CacheConfig) -> Result<Arc<dyn KeyValueStorage>> {
  if !config.enabled {
    debug!("Cache disabled");
    return Ok(Arc::new(NoopStorage));
  }

  let storage = SqliteStorage::open(config.path.as_deref())?;
  let purged = storage.purge_expired(Utc::now())?;
  if purged > 0 {
    debug!(purged, "Purged expired cache entries");
  }
  Ok(Arc::new(storage))
}
