//! Response shapes returned by the store client.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::fmt;

/// Code for a success response whose body did not match the expected shape.
pub const UNDECODABLE_BODY: &str = "UNDECODABLE_BODY";

/// Code for a delete that names no filter and was never sent.
pub const MISSING_FILTER: &str = "MISSING_FILTER";

/// Error body the REST interface sends with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
  /// Database or PostgREST error code (e.g. "23505", "PGRST116")
  #[serde(default)]
  pub code: String,
  pub message: String,
  #[serde(default)]
  pub details: Option<String>,
  #[serde(default)]
  pub hint: Option<String>,
  /// HTTP status the error arrived with
  #[serde(skip)]
  pub status: u16,
}

impl ApiError {
  /// Build an error from a status and raw response body.
  ///
  /// Falls back to the body text (or the status reason) when the body is not
  /// a structured error.
  pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
    match serde_json::from_str::<ApiError>(body) {
      Ok(mut error) => {
        error.status = status.as_u16();
        if error.code.is_empty() {
          error.code = status.as_str().to_string();
        }
        error
      }
      Err(_) => {
        let message = if body.trim().is_empty() {
          status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
        } else {
          body.trim().to_string()
        };
        Self {
          code: status.as_str().to_string(),
          message,
          details: None,
          hint: None,
          status: status.as_u16(),
        }
      }
    }
  }

  /// Error raised by the client itself for a request or response it
  /// cannot handle. Sending the same request again would fail the same way.
  pub fn client(code: &str, message: String, status: u16) -> Self {
    Self {
      code: code.to_string(),
      message,
      details: None,
      hint: None,
      status,
    }
  }

  /// Unique constraint violation.
  pub fn is_conflict(&self) -> bool {
    self.code == "23505" || self.status == 409
  }
}

impl fmt::Display for ApiError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} (code {})", self.message, self.code)?;
    if let Some(hint) = &self.hint {
      write!(f, ": {}", hint)?;
    }
    Ok(())
  }
}

/// What the server answered: rows, or an application-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreResponse<T> {
  Data(T),
  Failed(ApiError),
}

impl<T> StoreResponse<T> {
  pub fn error(&self) -> Option<&ApiError> {
    match self {
      StoreResponse::Data(_) => None,
      StoreResponse::Failed(error) => Some(error),
    }
  }

  /// Turn an application-level error into an `eyre` error.
  pub fn into_result(self) -> Result<T> {
    match self {
      StoreResponse::Data(data) => Ok(data),
      StoreResponse::Failed(error) => Err(eyre!("{}", error)),
    }
  }
}
