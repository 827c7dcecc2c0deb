//! Debounced value propagation.
//!
//! [`Debouncer`] holds an output value that follows its input only after the
//! input has stayed unchanged for the configured delay. Consumers read the
//! output or subscribe to it through a `watch` channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Delays propagation of a rapidly changing value until it settles.
///
/// Every [`set`](Debouncer::set) cancels the pending timer before arming a
/// new one, so only the last value of a burst is published. Setting the value
/// the output already holds arms nothing. Dropping the debouncer aborts the
/// pending timer; nothing is published after disposal.
///
/// Timers run on the ambient tokio runtime.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    output: Arc<watch::Sender<T>>,
    pending: Option<JoinHandle<()>>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T, delay: Duration) -> Self {
        let (output, _) = watch::channel(initial);
        Self {
            delay,
            output: Arc::new(output),
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Feed a new input value.
    pub fn set(&mut self, value: T) {
        self.cancel();

        if *self.output.borrow() == value {
            return;
        }

        let output = Arc::clone(&self.output);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            output.send_replace(value);
        }));
    }

    /// Current output value.
    pub fn get(&self) -> T {
        self.output.borrow().clone()
    }

    /// Receiver notified every time the output changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.output.subscribe()
    }

    /// `true` while a value is waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Drop the pending value, if any, without publishing it.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
