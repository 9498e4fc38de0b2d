//! Bounded fan-out with settle-all semantics.
//!
//! Items run in fixed-size batches. Members of a batch run concurrently on
//! the current task; the next batch starts only once every member of the
//! previous one has settled. A failing member never cancels its siblings.

use futures::future::join_all;
use std::future::Future;

use crate::error::ProvisionResult;

/// Outcome of one batched operation
#[derive(Debug)]
pub struct Settled<T, R> {
    pub item: T,
    pub result: ProvisionResult<R>,
}

impl<T, R> Settled<T, R> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `op` over `items`, `batch_size` at a time, and collect every outcome
/// in input order.
pub async fn settle_in_batches<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    mut op: F,
) -> Vec<Settled<T, R>>
where
    T: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ProvisionResult<R>>,
{
    let batch_size = batch_size.max(1);
    let mut settled = Vec::with_capacity(items.len());

    for chunk in items.chunks(batch_size) {
        let futures = chunk.iter().cloned().map(|item| {
            let fut = op(item.clone());
            async move {
                Settled {
                    item,
                    result: fut.await,
                }
            }
        });
        settled.extend(join_all(futures).await);
    }

    settled
}
