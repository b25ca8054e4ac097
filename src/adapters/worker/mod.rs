//! Background job processing.

mod pool;

pub use pool::{WorkerPool, WorkerPoolConfig};
