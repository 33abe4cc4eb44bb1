//! Shared concurrency/HTTP scaffolding used by the embedder client and
//! batch capture code paths: bounded-parallel batching with first-error
//! cancellation, and a retry wrapper for flaky upstream HTTP calls.

pub mod batch;
pub mod retry;

pub use batch::bounded_parallel_map;
pub use retry::{retry_with_backoff, AttemptFailure, RetryError};
