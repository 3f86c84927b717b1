//! Batch sizing and paced, best-effort application of mutations.

use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::pacing::{pause, PacingPolicy};

/// Chooses an operation batch size for a record set of `count` items.
///
/// Step function: up to 50 -> 25, up to 200 -> 50, up to 500 -> 75,
/// up to 1000 -> 100, beyond that 150.
pub fn batch_size_for(count: usize) -> usize {
    match count {
        0..=50 => 25,
        51..=200 => 50,
        201..=500 => 75,
        501..=1000 => 100,
        _ => 150,
    }
}

/// A single failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub reason: String,
}

/// Aggregate result of [`apply_batched`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: Vec<ItemFailure>,
    /// Number of chunks processed.
    pub batches: usize,
}

impl BatchOutcome {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

/// Applies `op` to every item, in order, in chunks of at most `batch_size`.
///
/// A failing item is recorded and processing continues. The item delay of
/// `pacing` follows every item; the batch delay follows every chunk. A batch
/// size of zero is treated as one.
pub async fn apply_batched<T, E, F, Fut>(
    label: &str,
    items: &[T],
    batch_size: usize,
    pacing: &PacingPolicy,
    mut op: F,
) -> BatchOutcome
where
    T: Clone + Display,
    E: Display,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut outcome = BatchOutcome::default();
    if items.is_empty() {
        return outcome;
    }

    let batch_size = batch_size.max(1);
    let total_batches = items.len().div_ceil(batch_size);

    for (index, chunk) in items.chunks(batch_size).enumerate() {
        info!(
            operation = label,
            batch = index + 1,
            total_batches,
            size = chunk.len(),
            "Processing batch"
        );

        for item in chunk {
            match op(item.clone()).await {
                Ok(()) => {
                    debug!(operation = label, item = %item, "Item applied");
                    outcome.succeeded += 1;
                }
                Err(e) => {
                    warn!(operation = label, item = %item, error = %e, "Item failed");
                    outcome.failed.push(ItemFailure {
                        item: item.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
            pause(pacing.item_delay()).await;
        }

        outcome.batches += 1;
        debug!(operation = label, delay = ?pacing.batch_delay(), "Pausing after batch");
        pause(pacing.batch_delay()).await;
    }

    outcome
}
