pub mod deferred;
pub mod event_bus;
pub mod worker_pool;

pub use deferred::*;
pub use event_bus::*;
pub use worker_pool::*;
