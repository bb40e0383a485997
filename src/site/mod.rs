//! Site data: images, articles, contact submissions, newsletter signups and
//! the admin role check.

pub mod client;
pub mod collection;
pub mod types;

pub use client::SiteClient;
pub use collection::Collection;
