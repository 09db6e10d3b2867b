//! Global connection cap
//!
//! Admits at most `max_connections` concurrent network fetches across the
//! whole process. Excess requests suspend on the semaphore and are admitted
//! in FIFO order as slots free up, so throughput stays saturated up to the
//! cap without busy-waiting.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of in-flight network fetches
pub struct ConnectionGovernor {
    permits: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionGovernor {
    pub fn new(max_connections: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Waits for a free slot. The slot is held until the returned permit is
    /// dropped, which wakes the next queued waiter.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        // The semaphore is never closed, so acquisition cannot fail.
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("connection governor semaphore closed")
    }

    /// The configured cap.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Currently free slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
