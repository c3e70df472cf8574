//! Item processing and the bounded worker pool.

mod processor;
mod worker;

pub use processor::{FetchProcessor, ItemProcessor};
pub use worker::WorkerPool;
