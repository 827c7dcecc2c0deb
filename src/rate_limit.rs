//! Dispatch spacing for provider requests.
//!
//! Places providers throttle bursts, so the heatmap engine spaces out when
//! its proximity queries START rather than counting requests in a window.
//! Each caller reserves the next free slot; slots are `interval` apart.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces request dispatches at least `interval` apart.
#[derive(Debug)]
pub struct DispatchLimiter {
    interval: Duration,
    next_dispatch: Mutex<Option<Instant>>,
    dispatched_count: AtomicU32,
}

impl DispatchLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: Mutex::new(None),
            dispatched_count: AtomicU32::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of slots handed out so far.
    pub fn dispatched(&self) -> u32 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    /// Wait for our dispatch slot and return its 1-based sequence number.
    ///
    /// The first caller dispatches immediately; every later caller is placed
    /// `interval` after the previous reservation, or now if that is already
    /// in the past.
    pub async fn wait_for_slot(&self) -> u32 {
        let (wait_duration, dispatch_num) = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();

            let dispatch_at = match *next {
                Some(at) if at > now => at,
                _ => now,
            };

            // Reserve the next slot for the next caller
            *next = Some(dispatch_at + self.interval);

            let num = self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1;
            (dispatch_at - now, num)
        };

        // Wait outside the lock
        if !wait_duration.is_zero() {
            debug!("[DispatchLimiter #{}] Waiting {:?} for slot", dispatch_num, wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        dispatch_num
    }
}
