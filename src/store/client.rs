use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;

use super::query::Query;
use super::types::{ApiError, StoreResponse, MISSING_FILTER, UNDECODABLE_BODY};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for the hosted database
#[derive(Clone)]
pub struct StoreClient {
  http: reqwest::Client,
  rest_url: Url,
}

impl StoreClient {
  pub fn new(project_url: &str, api_key: &str) -> Result<Self> {
    Self::with_builder(project_url, api_key, reqwest::Client::builder())
  }

  /// Like [`StoreClient::new`], starting from a preconfigured HTTP client builder.
  pub fn with_builder(
    project_url: &str,
    api_key: &str,
    builder: reqwest::ClientBuilder,
  ) -> Result<Self> {
    let rest_url = rest_base_url(project_url)?;

    let mut headers = HeaderMap::new();
    let key = HeaderValue::from_str(api_key).map_err(|e| eyre!("Invalid API key: {}", e))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
      .map_err(|e| eyre!("Invalid API key: {}", e))?;
    headers.insert("apikey", key);
    headers.insert(AUTHORIZATION, bearer);

    let http = builder
      .default_headers(headers)
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, rest_url })
  }

  /// Read rows matching `query`
  pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<StoreResponse<Vec<T>>> {
    let url = self.table_url(query.table(), &query.params())?;

    let response = send(query.table(), self.http.get(url)).await?;
    decode(query.table(), response).await
  }

  /// Insert one row and return what the database stored
  pub async fn insert<B, T>(&self, table: &str, row: &B) -> Result<StoreResponse<Vec<T>>>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let url = self.table_url(table, &[])?;

    let request = self
      .http
      .post(url)
      .header("Prefer", "return=representation")
      .json(row);

    let response = send(table, request).await?;
    decode(table, response).await
  }

  /// Delete rows matching the filters of `query`
  ///
  /// A query without filters is answered locally with [`MISSING_FILTER`].
  pub async fn delete(&self, query: &Query) -> Result<StoreResponse<()>> {
    let filters = query.filter_params();
    if filters.is_empty() {
      // An unfiltered delete would empty the table
      return Ok(StoreResponse::Failed(ApiError::client(
        MISSING_FILTER,
        format!("Refusing to delete from {} without a filter", query.table()),
        0,
      )));
    }

    let url = self.table_url(query.table(), &filters)?;
    let request = self.http.delete(url).header("Prefer", "return=minimal");
    let response = send(query.table(), request).await?;

    let status = response.status();
    if status.is_success() {
      return Ok(StoreResponse::Data(()));
    }

    let body = response
      .text()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", query.table(), e))?;
    Ok(StoreResponse::Failed(ApiError::from_response(status, &body)))
  }

  fn table_url(&self, table: &str, params: &[(String, String)]) -> Result<Url> {
    table_url(&self.rest_url, table, params)
  }
}

fn table_url(rest_url: &Url, table: &str, params: &[(String, String)]) -> Result<Url> {
  let mut url = rest_url
    .join(table)
    .map_err(|e| eyre!("Invalid table name {}: {}", table, e))?;

  if !params.is_empty() {
    url.query_pairs_mut().extend_pairs(params);
  }

  Ok(url)
}

/// `{project}/rest/v1/`, always with a trailing slash so tables can be joined.
fn rest_base_url(project_url: &str) -> Result<Url> {
  let mut base =
    Url::parse(project_url).map_err(|e| eyre!("Invalid database URL {}: {}", project_url, e))?;

  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }

  base
    .join("rest/v1/")
    .map_err(|e| eyre!("Invalid database URL {}: {}", project_url, e))
}

async fn send(table: &str, request: RequestBuilder) -> Result<Response> {
  request
    .send()
    .await
    .map_err(|e| eyre!("Failed to reach {}: {}", table, e))
}

async fn decode<T: DeserializeOwned>(table: &str, response: Response) -> Result<StoreResponse<T>> {
  let status = response.status();
  let body = response
    .text()
    .await
    .map_err(|e| eyre!("Failed to read response from {}: {}", table, e))?;

  if !status.is_success() {
    return Ok(StoreResponse::Failed(ApiError::from_response(status, &body)));
  }

  match serde_json::from_str(&body) {
    Ok(data) => Ok(StoreResponse::Data(data)),
    Err(e) => Ok(StoreResponse::Failed(ApiError::client(
      UNDECODABLE_BODY,
      format!("Failed to parse {} response: {}", table, e),
      status.as_u16(),
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rest_base_url() {
    let base = rest_base_url("https://abc.supabase.co").unwrap();
    assert_eq!(base.as_str(), "https://abc.supabase.co/rest/v1/");

    let base = rest_base_url("http://localhost:54321/").unwrap();
    assert_eq!(base.as_str(), "http://localhost:54321/rest/v1/");
  }

  #[test]
  fn test_rest_base_url_keeps_path_prefix() {
    let base = rest_base_url("https://example.org/db").unwrap();
    assert_eq!(base.as_str(), "https://example.org/db/rest/v1/");
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    assert!(rest_base_url("not a url").is_err());
  }

  #[test]
  fn test_table_url_encodes_params() {
    let base = rest_base_url("https://abc.supabase.co").unwrap();
    let query = Query::on("articles")
      .eq("slug", "food drive")
      .order("created_at", false);

    let url = table_url(&base, query.table(), &query.params()).unwrap();
    assert_eq!(
      url.as_str(),
      "https://abc.supabase.co/rest/v1/articles?select=*&slug=eq.food+drive&order=created_at.desc"
    );
  }

  #[test]
  fn test_invalid_key_is_rejected() {
    assert!(StoreClient::new("https://abc.supabase.co", "bad\nkey").is_err());
  }

  #[tokio::test]
  async fn test_unfiltered_delete_is_refused_locally() {
    let client = StoreClient::with_builder(
      "http://127.0.0.1:9",
      "test-key",
      reqwest::Client::builder().no_proxy(),
    )
    .unwrap();

    let response = client.delete(&Query::on("images")).await.unwrap();

    let error = response.error().unwrap();
    assert_eq!(error.code, MISSING_FILTER);
    assert!(error.message.contains("images"));
  }

  #[test]
  fn test_table_url_without_params() {
    let base = rest_base_url("https://abc.supabase.co").unwrap();
    let url = table_url(&base, "images", &[]).unwrap();
    assert_eq!(url.as_str(), "https://abc.supabase.co/rest/v1/images");
  }
}
