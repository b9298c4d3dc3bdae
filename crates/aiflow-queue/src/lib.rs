//! Job store boundary.
//!
//! This crate provides:
//! - The `JobStore` trait: push subscription + row status updates
//! - An in-process store for development and tests
//! - A Redis-backed store (hash rows, Pub/Sub notifications)

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryJobStore;
pub use redis_store::RedisJobStore;
pub use store::{JobEventStream, JobStore};
