use std::cmp;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::executor::{Executor, SequentialExecutor, ThreadExecutor};

/// How work is scheduled, decided once when the process starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "clap", derive(clap::ArgEnum))]
pub enum Dispatch {
    /// A fixed number of OS threads draining a shared queue
    Threads,
    /// A single worker running on the calling thread
    Sequential,
}

impl Default for Dispatch {
    fn default() -> Self {
        Self::Threads
    }
}

impl Dispatch {
    /// Zero workers always falls back to sequential dispatch.
    pub fn executor(self, num_workers: usize) -> Arc<dyn Executor> {
        match self {
            Self::Threads if num_workers > 0 => Arc::new(ThreadExecutor::new(num_workers)),
            _ => Arc::new(SequentialExecutor),
        }
    }
}

pub fn default_num_workers() -> usize {
    cmp::max(1, num_cpus::get().saturating_sub(2))
}
