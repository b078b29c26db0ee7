//! Bounded-parallel batch execution.
//!
//! Fan-out to a large follower set must neither serialise row by row nor
//! spawn one task per follower. [`run_batched`] splits the work into chunks
//! no larger than the backing store's native batch limit and drives them
//! through a fixed-width pool, reporting per-chunk outcomes without retrying
//! anything itself.

use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream;

/// One failed chunk, identified by its position in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure<E> {
    /// Zero-based index of the chunk in submission order.
    pub batch_index: usize,
    /// Number of items in the failed chunk.
    pub len: usize,
    /// The error returned by the batch operation.
    pub error: E,
}

/// Aggregated outcome of a batched run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOutcome<E> {
    /// Total chunks submitted.
    pub batches: usize,
    /// Total items across all chunks.
    pub items: usize,
    /// Chunks that returned an error, in no particular order.
    pub failures: Vec<BatchFailure<E>>,
}

impl<E> AggregateOutcome<E> {
    /// Whether every chunk succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of chunks that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.batches.saturating_sub(self.failures.len())
    }
}

/// Run `op` over `items` in chunks of at most `batch_size`, with at most
/// `max_parallelism` chunks in flight at once.
///
/// Completion order is unspecified; the final state must not depend on it.
/// The call returns once every chunk has finished, successful or not.
/// `batch_size` and `max_parallelism` are clamped to a minimum of 1.
///
/// # Examples
/// ```
/// use backend::domain::batch::run_batched;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let outcome = run_batched(vec![1, 2, 3], 2, 4, |chunk| async move {
///     if chunk.contains(&3) { Err("boom") } else { Ok(()) }
/// })
/// .await;
/// assert_eq!(outcome.batches, 2);
/// assert_eq!(outcome.failures.len(), 1);
/// # });
/// ```
pub async fn run_batched<T, E, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    max_parallelism: usize,
    op: F,
) -> AggregateOutcome<E>
where
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let batch_size = batch_size.max(1);
    let max_parallelism = max_parallelism.max(1);
    let total_items = items.len();

    let mut chunks = Vec::new();
    let mut source = items.into_iter();
    loop {
        let chunk: Vec<T> = source.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    let batches = chunks.len();

    let op = &op;
    let results: Vec<(usize, usize, Result<(), E>)> = stream::iter(chunks.into_iter().enumerate())
        .map(|(batch_index, chunk)| async move {
            let len = chunk.len();
            (batch_index, len, op(chunk).await)
        })
        .buffer_unordered(max_parallelism)
        .collect()
        .await;

    let failures = results
        .into_iter()
        .filter_map(|(batch_index, len, result)| {
            result.err().map(|error| BatchFailure {
                batch_index,
                len,
                error,
            })
        })
        .collect();

    AggregateOutcome {
        batches,
        items: total_items,
        failures,
    }
}
