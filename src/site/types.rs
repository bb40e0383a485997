//! Records stored in the site's database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image in the admin image library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
  pub id: String,
  /// Durable URL from the upload service
  pub url: String,
  pub name: String,
  pub created_at: DateTime<Utc>,
}

/// Fields supplied when adding an image
#[derive(Debug, Clone, Serialize)]
pub struct NewImage {
  pub url: String,
  pub name: String,
}

/// Blog article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
  pub id: String,
  pub title: String,
  pub slug: String,
  #[serde(default)]
  pub summary: Option<String>,
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub published: bool,
  pub created_at: DateTime<Utc>,
}

/// Contact form submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
  pub id: String,
  pub name: String,
  pub email: String,
  pub message: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSubscriber {
  pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Editor,
  Viewer,
}

/// User profile carrying the role used to gate the admin area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
  pub role: Role,
}

impl Profile {
  pub fn is_admin(&self) -> bool {
    self.role == Role::Admin
  }
}

/// Loose shape check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
  if email.chars().any(char::is_whitespace) {
    return false;
  }

  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };

  !local.is_empty()
    && !domain.contains('@')
    && domain.contains('.')
    && !domain.starts_with('.')
    && !domain.ends_with('.')
    && !domain.contains("..")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_valid_emails() {
    assert!(is_valid_email("volunteer@example.org"));
    assert!(is_valid_email("first.last+news@mail.example.co.uk"));
  }

  #[test]
  fn test_invalid_emails() {
    for email in [
      "",
      "plainaddress",
      "@example.org",
      "someone@",
      "someone@localhost",
      "a@b@example.org",
      "someone@.example.org",
      "someone@example.org.",
      "someone@example..org",
      "some one@example.org",
    ] {
      assert!(!is_valid_email(email), "{} should be rejected", email);
    }
  }

  #[test]
  fn test_profile_role_parsing() {
    let profile: Profile =
      serde_json::from_str(r#"{"id":"u1","email":"a@b.org","role":"admin"}"#).unwrap();
    assert!(profile.is_admin());

    let profile: Profile = serde_json::from_str(r#"{"id":"u2","role":"editor"}"#).unwrap();
    assert!(!profile.is_admin());
    assert_eq!(profile.email, None);
  }

  #[test]
  fn test_article_from_database_row() {
    let row = r#"{
      "id": "a1",
      "title": "Spring food drive",
      "slug": "spring-food-drive",
      "summary": null,
      "body": "We collected...",
      "published": true,
      "created_at": "2026-04-01T09:30:00.123456+00:00"
    }"#;
    let article: Article = serde_json::from_str(row).unwrap();

    assert_eq!(article.slug, "spring-food-drive");
    assert!(article.published);
    assert!(article.summary.is_none());
  }
}
