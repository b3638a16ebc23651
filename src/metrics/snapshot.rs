use crate::metrics::metrics_impl::MemoryCacheMetrics;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCacheMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,

    pub insert_calls: u64,
    pub insert_new: u64,
    pub insert_updates: u64,

    pub remove_calls: u64,
    pub clear_calls: u64,
    pub cleared_entries: u64,

    pub trim_count_calls: u64,
    pub trim_cost_calls: u64,
    pub trim_age_calls: u64,
    pub evicted_by_count: u64,
    pub evicted_by_cost: u64,
    pub evicted_by_age: u64,

    // gauges captured at snapshot time
    pub total_count: usize,
    pub total_cost: u64,
}

impl MemoryCacheMetricsSnapshot {
    pub(crate) fn capture(metrics: &MemoryCacheMetrics, total_count: usize, total_cost: u64) -> Self {
        Self {
            get_calls: metrics.get_calls,
            get_hits: metrics.get_hits,
            get_misses: metrics.get_misses,
            insert_calls: metrics.insert_calls,
            insert_new: metrics.insert_new,
            insert_updates: metrics.insert_updates,
            remove_calls: metrics.remove_calls,
            clear_calls: metrics.clear_calls,
            cleared_entries: metrics.cleared_entries,
            trim_count_calls: metrics.trim_count_calls,
            trim_cost_calls: metrics.trim_cost_calls,
            trim_age_calls: metrics.trim_age_calls,
            evicted_by_count: metrics.evicted_by_count,
            evicted_by_cost: metrics.evicted_by_cost,
            evicted_by_age: metrics.evicted_by_age,
            total_count,
            total_cost,
        }
    }

    /// Hit ratio in `[0, 1]`, or `0.0` before the first `get`.
    pub fn hit_ratio(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_hits as f64 / self.get_calls as f64
        }
    }

    /// Entries removed by any trim pass.
    pub fn evicted_total(&self) -> u64 {
        self.evicted_by_count + self.evicted_by_cost + self.evicted_by_age
    }
}
