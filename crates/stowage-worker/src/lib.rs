//! Stowage Worker
//!
//! In-process background queue for fire-and-forget work that must not hold up an upload,
//! such as text extraction from finished files.

pub mod queue;

pub use queue::{BackgroundQueue, BackgroundQueueConfig, Job, QueueError};
