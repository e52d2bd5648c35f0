pub mod pool;
pub mod queue;

pub use pool::{PendingResult, Pool};
pub use queue::OrderedQueue;
