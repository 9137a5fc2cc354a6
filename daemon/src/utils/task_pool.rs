use super::log_panic;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{error, warn};
use std::panic::AssertUnwindSafe;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

type ProcessorFn<I, O> =
    dyn Fn(I) -> BoxFuture<'static, anyhow::Result<O>> + Send + Sync + 'static;

/// Fixed number of workers draining a batch through a shared cursor.
///
/// A failing or panicking item yields `None` in its slot; the rest of the
/// batch is unaffected.
pub struct TaskPool {
    workers: usize,
}

impl TaskPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Runs `processor` over `items`; results keep the input order.
    pub async fn run<I, O, F>(&self, items: Vec<I>, processor: F) -> Vec<Option<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> BoxFuture<'static, anyhow::Result<O>> + Send + Sync + 'static,
    {
        let total = items.len();
        let mut results: Vec<Option<O>> = (0..total).map(|_| None).collect();
        if total == 0 {
            return results;
        }

        let slots: Arc<Vec<Mutex<Option<I>>>> =
            Arc::new(items.into_iter().map(|item| Mutex::new(Some(item))).collect());
        let cursor = Arc::new(AtomicUsize::new(0));
        let processor = Arc::new(processor) as Arc<ProcessorFn<I, O>>;

        let mut workers = JoinSet::new();
        for _ in 0..self.workers.min(total) {
            let slots = slots.clone();
            let cursor = cursor.clone();
            let processor = processor.clone();
            workers.spawn(async move {
                let mut done = vec![];
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(slot) = slots.get(index) else {
                        break;
                    };
                    let Some(item) = slot.lock().await.take() else {
                        continue;
                    };
                    match AssertUnwindSafe(processor(item)).catch_unwind().await {
                        Ok(Ok(output)) => done.push((index, output)),
                        Ok(Err(e)) => warn!("task {} failed: {:#}", index, e),
                        Err(panic) => error!("task {} panicked: {}", index, log_panic(panic)),
                    }
                }
                done
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(done) => {
                    for (index, output) in done {
                        results[index] = Some(output);
                    }
                }
                Err(e) => error!("task pool worker stopped: {}", e),
            }
        }
        results
    }
}
