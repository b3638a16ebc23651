use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::MemoryCacheMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for cache metrics snapshots.
///
/// Writes the text exposition format so the output can be scraped directly
/// or forwarded to a collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_metric(&self, kind: &str, suffix: &str, value: u64) {
        let name = if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        };
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} {}", name, kind);
        let _ = writeln!(writer, "{} {}", name, value);
    }
}

impl<W: Write + Send> MetricsExporter<MemoryCacheMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, s: &MemoryCacheMetricsSnapshot) {
        self.write_metric("counter", "get_calls_total", s.get_calls);
        self.write_metric("counter", "get_hits_total", s.get_hits);
        self.write_metric("counter", "get_misses_total", s.get_misses);
        self.write_metric("counter", "insert_new_total", s.insert_new);
        self.write_metric("counter", "insert_updates_total", s.insert_updates);
        self.write_metric("counter", "remove_calls_total", s.remove_calls);
        self.write_metric("counter", "cleared_entries_total", s.cleared_entries);
        self.write_metric("counter", "evicted_by_count_total", s.evicted_by_count);
        self.write_metric("counter", "evicted_by_cost_total", s.evicted_by_cost);
        self.write_metric("counter", "evicted_by_age_total", s.evicted_by_age);
        self.write_metric("gauge", "total_count", s.total_count as u64);
        self.write_metric("gauge", "total_cost", s.total_cost);
    }
}
