use crate::metrics::traits::{CoreMetricsRecorder, TrimMetricsRecorder, TrimReason};

#[derive(Debug, Default, Clone)]
pub struct MemoryCacheMetrics {
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
}

impl CoreMetricsRecorder for MemoryCacheMetrics {
    fn record_get_hit(&mut self) {
        self.get_calls += 1;
        self.get_hits += 1;
    }

    fn record_get_miss(&mut self) {
        self.get_calls += 1;
        self.get_misses += 1;
    }

    fn record_insert_new(&mut self) {
        self.insert_calls += 1;
        self.insert_new += 1;
    }

    fn record_insert_update(&mut self) {
        self.insert_calls += 1;
        self.insert_updates += 1;
    }

    fn record_remove(&mut self) {
        self.remove_calls += 1;
    }

    fn record_clear(&mut self, cleared: usize) {
        self.clear_calls += 1;
        self.cleared_entries += cleared as u64;
    }
}

impl TrimMetricsRecorder for MemoryCacheMetrics {
    fn record_trim_call(&mut self, reason: TrimReason) {
        match reason {
            TrimReason::Count => self.trim_count_calls += 1,
            TrimReason::Cost => self.trim_cost_calls += 1,
            TrimReason::Age => self.trim_age_calls += 1,
        }
    }

    fn record_evicted(&mut self, reason: TrimReason, entries: usize) {
        let entries = entries as u64;
        match reason {
            TrimReason::Count => self.evicted_by_count += entries,
            TrimReason::Cost => self.evicted_by_cost += entries,
            TrimReason::Age => self.evicted_by_age += entries,
        }
    }
}
