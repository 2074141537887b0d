//! Background Tasks Module
//!
//! Tasks that run periodically while the cache layer is alive. Every spawn
//! function returns the task's `JoinHandle` so the owner can abort it.
//!
//! # Tasks
//! - Expiry sweep: removes expired entries from a cache at a fixed interval
//! - Refresh: re-fetches one key on its strategy's refetch cadence

mod cleanup;
mod refresh;

pub use cleanup::{spawn_cleanup_task, Sweep};
pub use refresh::spawn_refresh_task;
