//! One-shot cancellable session timers.
//!
//! The engine runs exactly two of these per session (ack-receive and
//! send-ack). A timer is armed with an expiry future; stopping it aborts the
//! pending task. The slot is cleared before the expiry future runs, so an
//! expiry handler may re-arm its own timer and a `stop()` issued from inside
//! a handler never aborts the handler itself.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// A one-shot timer scoped to a session.
pub(crate) struct Timer {
    label: &'static str,
    period: Duration,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Timer {
    pub fn new(label: &'static str, period: Duration) -> Self {
        Self {
            label,
            period,
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Arm the timer. No-op when it is already running.
    pub fn start<F>(&self, on_expiry: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.task.lock().expect("timer slot poisoned");
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let task = Arc::clone(&self.task);
        let period = self.period;
        let label = self.label;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            // Clear the slot first: the handler below may stop or re-arm
            // timers, and must not abort itself doing so.
            task.lock().expect("timer slot poisoned").take();
            tracing::debug!("{} timer expired after {:?}", label, period);
            on_expiry.await;
        }));
    }

    /// Cancel a pending expiry. No-op when the timer is not running.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().expect("timer slot poisoned").take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .expect("timer slot poisoned")
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
