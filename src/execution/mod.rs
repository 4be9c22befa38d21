// Order execution module
pub mod client;
pub mod dedupe;
pub mod dispatcher;

pub use client::{ExecutionClient, RestExecutionClient};
pub use dedupe::DedupeCache;
pub use dispatcher::{ExecutionDispatcher, OrderIntent};
