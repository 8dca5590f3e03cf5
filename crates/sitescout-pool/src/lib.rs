mod config;
mod executor;
mod pool;

pub use config::{default_num_workers, Dispatch};
pub use executor::{Executor, SequentialExecutor, ThreadExecutor};
pub use pool::{PoolOutcome, WorkerFailure, WorkerPool};

pub use anyhow;
