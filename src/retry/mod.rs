//! Retry with exponential backoff for requests against the data store.
//!
//! A request is any async operation returning `Result<T, E>`. Only `Err`
//! counts as a failed attempt; whatever the operation returns inside `Ok`
//! (including an application-level error payload) is handed straight back to
//! the caller.
//!
//! Whatever happens, the caller gets a single [`RequestResult`](executor::RequestResult): either the
//! value from the first successful attempt, or a [`RequestError`](executor::RequestError) describing
//! the exhausted run. Intermediate failures are only visible in the logs.

mod executor;
mod policy;

pub use executor::execute_with_retry;
pub use policy::RetryPolicy;
