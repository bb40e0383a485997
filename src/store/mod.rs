//! Client for the hosted database's REST interface.
//!
//! Calls resolve to a [`StoreResponse`] for anything the server answered,
//! including error statuses and success bodies of the wrong shape. Only
//! transport failures (no connection, timeout, truncated body) come back as
//! `Err`, which is what the retry executor reacts to.

mod client;
mod query;
mod types;

pub use client::StoreClient;
pub use query::Query;
pub use types::StoreResponse;
