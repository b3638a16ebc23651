//! Periodic driver for the combined trim pass.
//!
//! [`AutoTrimScheduler`] owns one named thread that waits `interval` between
//! passes. Passes run inline on that thread, so a pass never overlaps the
//! previous one. The pass closure returns [`ControlFlow::Break`] once its
//! target is gone (the cache holds only a `Weak` to its state), and
//! [`stop`](AutoTrimScheduler::stop) ends the thread early. Stopping twice is
//! a no-op.

use std::fmt;
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::ConfigError;

/// Default period between trim passes.
pub const DEFAULT_AUTO_TRIM_INTERVAL: Duration = Duration::from_secs(5);

struct Running {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct AutoTrimScheduler {
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl AutoTrimScheduler {
    /// Spawns a thread named `thread_name` that calls `pass` every `interval`.
    pub fn spawn<F>(thread_name: &str, interval: Duration, mut pass: F) -> Result<Self, ConfigError>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(ConfigError::new("auto_trim_interval must be non-zero"));
        }

        let (shutdown, shutdown_rx) = channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if pass().is_break() {
                                break;
                            }
                        },
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!(interval = ?interval, "auto-trim thread exiting");
            })
            .map_err(|err| ConfigError::new(format!("failed to spawn auto-trim thread: {}", err)))?;

        Ok(Self {
            interval,
            running: Mutex::new(Some(Running { shutdown, handle })),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` until the thread has been stopped or has exited.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Signals the thread and waits for an in-flight pass to finish.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        drop(running.shutdown);
        if running.handle.thread().id() != thread::current().id() {
            let _ = running.handle.join();
        }
    }
}

impl Drop for AutoTrimScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for AutoTrimScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoTrimScheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}
