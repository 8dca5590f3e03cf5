use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::executor::{panic_message, Executor, ThreadExecutor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    pub worker: usize,
    pub message: String,
}

/// Everything a [`WorkerPool`] run produced.
#[derive(Debug)]
pub struct PoolOutcome<R> {
    /// One value per successfully processed item, in completion order
    pub results: Vec<R>,
    /// One entry per worker that stopped on an error
    pub failures: Vec<WorkerFailure>,
    /// Items left in the queue because every worker stopped early
    pub unprocessed: usize,
}

impl<R> PoolOutcome<R> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.unprocessed == 0
    }
}

/// Drains a queue of items with a fixed set of workers.
///
/// Popping an item is a single `recv` on the shared channel, the processing
/// function runs outside of it. Once [`run`](Self::run) starts the sender is
/// closed, so workers stop by themselves when the queue is drained.
pub struct WorkerPool<T> {
    executor: Arc<dyn Executor>,
    tx_item: Sender<T>,
    rx_item: Receiver<T>,
    submitted: usize,
}

impl<T: Send> WorkerPool<T> {
    pub fn new(num_workers: usize) -> Self {
        Self::with_executor(Arc::new(ThreadExecutor::new(num_workers)))
    }

    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        let (tx_item, rx_item) = unbounded();
        Self {
            executor,
            tx_item,
            rx_item,
            submitted: 0,
        }
    }

    pub fn submit_batch<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            // Can't fail, the pool holds the receiver
            if self.tx_item.send(item).is_ok() {
                self.submitted += 1;
            }
        }
    }

    pub fn queued(&self) -> usize {
        self.rx_item.len()
    }

    /// Processes every queued item and blocks until all workers are joined.
    ///
    /// A worker whose `process` returns an error (or panics) records a
    /// [`WorkerFailure`] and stops, the remaining workers keep draining.
    pub fn run<R, F>(self, process: F) -> Result<PoolOutcome<R>>
    where
        R: Send,
        F: Fn(T) -> Result<R> + Sync,
    {
        let Self {
            executor,
            tx_item,
            rx_item,
            submitted,
        } = self;
        drop(tx_item);

        let (tx_res, rx_res) = unbounded::<R>();
        let (tx_fail, rx_fail) = unbounded::<WorkerFailure>();

        log::info!(
            "Dispatching {submitted} items to {} workers",
            executor.workers()
        );

        executor.run_workers(&|id| {
            log::debug!("Starting worker {id}");
            while let Ok(item) = rx_item.recv() {
                let message = match panic::catch_unwind(AssertUnwindSafe(|| process(item))) {
                    Ok(Ok(res)) => {
                        tx_res.send(res).ok();
                        continue;
                    }
                    Ok(Err(e)) => format!("{e:#}"),
                    Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
                };
                log::error!("Worker {id} stopping, got: {message}");
                tx_fail.send(WorkerFailure { worker: id, message }).ok();
                break;
            }
            log::debug!("Exiting worker {id}");
        })?;

        drop(tx_res);
        drop(tx_fail);

        Ok(PoolOutcome {
            results: rx_res.try_iter().collect(),
            failures: rx_fail.try_iter().collect(),
            unprocessed: rx_item.try_iter().count(),
        })
    }
}
