use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::thread;

use anyhow::{anyhow, Result};

/// Runs a worker body on a number of workers and waits for all of them.
///
/// Crawler, proxy validation and [`WorkerPool`](crate::WorkerPool) only talk
/// to this trait, so they don't depend on which backend was picked.
pub trait Executor: Send + Sync + fmt::Debug {
    fn workers(&self) -> usize;

    /// Calls `worker(id)` once for each worker id in `0..self.workers()` and
    /// returns once every call has returned.
    fn run_workers(&self, worker: &(dyn Fn(usize) + Sync)) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct ThreadExecutor {
    num_workers: NonZeroUsize,
}

impl ThreadExecutor {
    pub fn new(num_workers: usize) -> Self {
        let num_workers = NonZeroUsize::new(num_workers).unwrap_or(NonZeroUsize::MIN);
        Self { num_workers }
    }
}

impl Executor for ThreadExecutor {
    fn workers(&self) -> usize {
        self.num_workers.get()
    }

    fn run_workers(&self, worker: &(dyn Fn(usize) + Sync)) -> Result<()> {
        thread::scope(|s| -> Result<()> {
            let mut handles = vec![];
            for id in 0..self.workers() {
                let handle = thread::Builder::new()
                    .name(format!("worker-{id}"))
                    .spawn_scoped(s, move || worker(id))?;
                handles.push(handle);
            }

            let mut panicked = None;
            for (id, handle) in handles.into_iter().enumerate() {
                if let Err(e) = handle.join() {
                    log::error!("Worker {id} panicked: {}", panic_message(e.as_ref()));
                    panicked.get_or_insert(id);
                }
            }
            match panicked {
                Some(id) => Err(anyhow!("Worker {id} panicked")),
                None => Ok(()),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn workers(&self) -> usize {
        1
    }

    fn run_workers(&self, worker: &(dyn Fn(usize) + Sync)) -> Result<()> {
        worker(0);
        Ok(())
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}
