//! Optional operation counters for [`MemoryCache`](crate::cache::MemoryCache).
//!
//! Enabled by the `metrics` feature. Counters are plain integers updated by
//! the engine while it holds the structural lock, so recording needs no
//! atomics. Reading goes through a [`MemoryCacheMetricsSnapshot`].

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use exporter::PrometheusTextExporter;
pub use metrics_impl::MemoryCacheMetrics;
pub use snapshot::MemoryCacheMetricsSnapshot;
pub use traits::{
    CoreMetricsRecorder, MetricsExporter, MetricsSnapshotProvider, TrimMetricsRecorder, TrimReason,
};
