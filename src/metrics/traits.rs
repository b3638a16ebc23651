//! # Metrics Trait Hierarchy
//!
//! Recording, snapshotting and exporting are split into small traits so the
//! engine only ever writes counters and monitoring code only ever reads them.
//!
//! ```text
//!   ┌─────────────────────────────┐
//!   │     CoreMetricsRecorder     │  get hit/miss, insert, remove, clear
//!   └──────────────┬──────────────┘
//!                  ▼
//!   ┌─────────────────────────────┐
//!   │     TrimMetricsRecorder     │  trim passes, evictions per limit
//!   └─────────────────────────────┘
//!
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```

/// Counters shared by every access path.
pub trait CoreMetricsRecorder {
    fn record_get_hit(&mut self);
    fn record_get_miss(&mut self);
    fn record_insert_new(&mut self);
    fn record_insert_update(&mut self);
    fn record_remove(&mut self);
    fn record_clear(&mut self, cleared: usize);
}

/// Which limit caused an eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimReason {
    Count,
    Cost,
    Age,
}

/// Counters for trim passes.
pub trait TrimMetricsRecorder: CoreMetricsRecorder {
    fn record_trim_call(&mut self, reason: TrimReason);
    fn record_evicted(&mut self, reason: TrimReason, entries: usize);
}

/// Produces a point-in-time copy of the counters.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Publishes a snapshot to a monitoring backend.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
