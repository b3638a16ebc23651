//! # Deferred release
//!
//! Values leave the cache as owned batches ([`Detached`](crate::engine::Detached))
//! after the structural lock is dropped. A [`ReleaseQueue`] decides where the
//! final drop runs:
//!
//! ```text
//!   caller thread                     release worker / designated context
//!   ─────────────                     ───────────────────────────────────
//!   lock ─► detach ─► unlock
//!                      │
//!                      ├─ Synchronous ─► drop(batch) here
//!                      │
//!                      ├─ Background ──► channel ──► worker: drop(batch)
//!                      │
//!                      └─ designated ──► context.execute(|| drop(batch))
//! ```
//!
//! Each batch is moved exactly once, so each value is released exactly once.
//! Ordering across batches is not guaranteed.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::ConfigError;

/// Work submitted to a [`ReleaseContext`].
pub type ReleaseJob = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that can run release jobs, e.g. a UI or main thread.
pub trait ReleaseContext: Send + Sync {
    fn execute(&self, job: ReleaseJob);
}

/// Where batches are dropped when no designated context is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    /// Drop on the calling thread, right after the lock is released.
    Synchronous,
    /// Drop on the queue's worker thread.
    #[default]
    Background,
}

enum Message<T> {
    Release(T),
    Flush(Sender<()>),
}

/// Hands detached batches to the configured drop site.
pub struct ReleaseQueue<T> {
    label: String,
    mode: ReleaseMode,
    designated: Option<Arc<dyn ReleaseContext>>,
    sender: Option<Sender<Message<T>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> ReleaseQueue<T> {
    /// Creates a queue for the cache named `label`; `Background` mode spawns
    /// a worker thread named `{label}-release`.
    pub fn new(
        mode: ReleaseMode,
        designated: Option<Arc<dyn ReleaseContext>>,
        label: &str,
    ) -> Result<Self, ConfigError> {
        let (sender, worker) = if mode == ReleaseMode::Background && designated.is_none() {
            let (sender, receiver) = channel::unbounded::<Message<T>>();
            let handle = thread::Builder::new()
                .name(format!("{label}-release"))
                .spawn(move || run_worker(receiver))
                .map_err(|err| {
                    ConfigError::new(format!("failed to spawn release worker: {}", err))
                })?;
            (Some(sender), Some(handle))
        } else {
            (None, None)
        };

        Ok(Self {
            label: label.to_string(),
            mode,
            designated,
            sender,
            worker: Mutex::new(worker),
        })
    }

    /// Creates a queue that always drops on the calling thread.
    pub fn synchronous() -> Self {
        Self {
            label: "memkit".to_string(),
            mode: ReleaseMode::Synchronous,
            designated: None,
            sender: None,
            worker: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> ReleaseMode {
        self.mode
    }

    /// Returns `true` if batches are routed to a designated context.
    pub fn is_designated(&self) -> bool {
        self.designated.is_some()
    }

    /// Takes ownership of `batch` and drops it at the configured site.
    pub fn release(&self, batch: T) {
        if let Some(context) = &self.designated {
            context.execute(Box::new(move || drop(batch)));
            return;
        }

        match &self.sender {
            Some(sender) => {
                if let Err(err) = sender.send(Message::Release(batch)) {
                    tracing::warn!(
                        cache = %self.label,
                        "release worker is gone, dropping batch on caller thread"
                    );
                    drop(err.into_inner());
                }
            },
            None => drop(batch),
        }
    }

    /// Blocks until every batch released before this call has been dropped
    /// by the worker. A no-op outside `Background` mode.
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack_tx, ack_rx) = channel::bounded(1);
        if sender.send(Message::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

impl<T> ReleaseQueue<T> {
    /// Closes the channel and waits for the worker to drain it. Idempotent.
    pub fn shutdown(&mut self) {
        self.sender = None;
        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn run_worker<T>(receiver: Receiver<Message<T>>) {
    for message in receiver.iter() {
        match message {
            Message::Release(batch) => drop(batch),
            Message::Flush(ack) => {
                let _ = ack.send(());
            },
        }
    }
}

impl<T> Drop for ReleaseQueue<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T> fmt::Debug for ReleaseQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseQueue")
            .field("label", &self.label)
            .field("mode", &self.mode)
            .field("designated", &self.designated.is_some())
            .field("worker", &self.worker.lock().is_some())
            .finish()
    }
}

/// A [`ReleaseContext`] whose jobs run when its owner calls
/// [`run_pending`](DesignatedThread::run_pending).
///
/// Hand a clone to the cache and pump it from the thread that must perform
/// the final drop.
///
/// ```
/// use std::sync::Arc;
/// use memkit::release::{DesignatedThread, ReleaseContext};
///
/// let main = DesignatedThread::new();
/// main.execute(Box::new(|| {}));
/// assert_eq!(main.pending(), 1);
/// assert_eq!(main.run_pending(), 1);
/// ```
#[derive(Clone)]
pub struct DesignatedThread {
    sender: Sender<ReleaseJob>,
    receiver: Receiver<ReleaseJob>,
}

impl DesignatedThread {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self { sender, receiver }
    }

    /// Runs every queued job on the calling thread; returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        for job in self.receiver.try_iter() {
            job();
            ran += 1;
        }
        ran
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for DesignatedThread {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseContext for DesignatedThread {
    fn execute(&self, job: ReleaseJob) {
        // We hold a receiver, so the channel cannot be disconnected.
        let _ = self.sender.send(job);
    }
}

impl fmt::Debug for DesignatedThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesignatedThread")
            .field("pending", &self.pending())
            .finish()
    }
}
