//! Caching metadata for site records.

use crate::cache::Cacheable;

use super::types::{Article, Image, Submission};

/// A database table whose full contents are cached as one collection.
pub trait Collection: Cacheable {
  /// Table name in the database
  const TABLE: &'static str;
  /// Key the cached collection is stored under
  const CACHE_KEY: &'static str;
  /// Column the collection is ordered by, newest first
  const ORDER_BY: &'static str = "created_at";
}

impl Cacheable for Image {
  fn cache_key(&self) -> String {
    self.id.clone()
  }
}

impl Collection for Image {
  const TABLE: &'static str = "images";
  const CACHE_KEY: &'static str = "images";
}

impl Cacheable for Article {
  fn cache_key(&self) -> String {
    self.id.clone()
  }
}

impl Collection for Article {
  const TABLE: &'static str = "articles";
  const CACHE_KEY: &'static str = "articles";
}

impl Cacheable for Submission {
  fn cache_key(&self) -> String {
    self.id.clone()
  }
}

impl Collection for Submission {
  const TABLE: &'static str = "contact_submissions";
  const CACHE_KEY: &'static str = "submissions";
}
