//! Bounded-parallel batch dispatcher: dispatches per-item work across up
//! to `max_workers` workers. On the first error, cancels the shared
//! scope so in-flight requests abort; collects per-index errors and
//! returns the first one with its index. Preserves result ordering by
//! indexed slot assignment, not completion order.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Runs `f` over every item in `items` with at most `max_workers`
/// concurrent in-flight calls (capped at `items.len()`). On the first
/// `Err`, remaining in-flight work is cancelled and `(index, error)` of
/// the first failure is returned; completed results from other slots
/// are discarded since the caller treats the whole batch as failed.
pub async fn bounded_parallel_map<T, R, E, F, Fut>(
    items: Vec<T>,
    max_workers: usize,
    f: F,
) -> Result<Vec<R>, (usize, E)>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let len = items.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    let workers = max_workers.max(1).min(len);
    let semaphore = Arc::new(Semaphore::new(workers));
    let cancel = CancellationToken::new();
    let f = Arc::new(f);

    let mut set = JoinSet::new();
    for (idx, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let f = f.clone();
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (idx, None);
            };
            if cancel.is_cancelled() {
                return (idx, None);
            }
            tokio::select! {
                result = f(item) => (idx, Some(result)),
                _ = cancel.cancelled() => (idx, None),
            }
        });
    }

    let mut slots: Vec<Option<R>> = (0..len).map(|_| None).collect();
    let mut first_error: Option<(usize, E)> = None;

    while let Some(joined) = set.join_next().await {
        let (idx, outcome) = match joined {
            Ok(pair) => pair,
            Err(_join_error) => continue,
        };
        match outcome {
            Some(Ok(value)) => slots[idx] = Some(value),
            Some(Err(err)) => {
                if first_error.is_none() {
                    cancel.cancel();
                    first_error = Some((idx, err));
                }
            }
            None => {}
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }

    let mut results = Vec::with_capacity(len);
    for (idx, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(value) => results.push(value),
            None => {
                // Only reachable if a spawned task panicked outright
                // (already skipped above) without ever reporting an
                // error or a value for its slot.
                unreachable!("worker task for slot {idx} left it empty without reporting an error")
            }
        }
    }
    Ok(results)
}
