pub mod burst;
pub mod pool;
pub mod result;

pub use burst::drain;
pub use pool::WorkerPool;
pub use result::{JobOutcome, JobResult};
