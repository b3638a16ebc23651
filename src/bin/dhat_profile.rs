//! DHAT heap profiler for memkit.
//!
//! Run with: cargo run --bin dhat_profile --release --features dhat-heap
//! View results: Open dhat-heap.json in <https://nnethercote.github.io/dh_view/dh_view.html>

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use memkit::builder::MemoryCacheBuilder;
use memkit::cache::MemoryCache;

/// Simple XorShift64 RNG for deterministic workloads.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / (u64::MAX as f64);
        (self.next_u64() as f64) * SCALE
    }
}

/// 90% of accesses hit 10% of keys; misses are filled with a cost of 64.
fn hotset_workload(cache: &MemoryCache<u64, Vec<u8>>, operations: usize, universe: u64, seed: u64) {
    let mut rng = XorShift64::new(seed);
    let hot_size = (universe as f64 * 0.1) as u64;

    for i in 0..operations {
        let key = if rng.next_f64() < 0.9 {
            rng.next_u64() % hot_size
        } else {
            hot_size + (rng.next_u64() % (universe - hot_size))
        };

        if cache.get(&key).is_none() {
            cache.set_with_cost(key, vec![0u8; 64], 64);
        }
        if i % 1_024 == 0 {
            cache.trim();
        }
    }
}

/// Sequential scan over the whole universe.
fn scan_workload(cache: &MemoryCache<u64, Vec<u8>>, operations: usize, universe: u64) {
    for i in 0..operations {
        let key = (i as u64) % universe;
        if cache.get(&key).is_none() {
            cache.set_with_cost(key, vec![0u8; 64], 64);
        }
    }
    cache.trim();
}

/// Repeated fill and clear, the allocation pattern of lifecycle signals.
fn clear_churn(cache: &MemoryCache<u64, Vec<u8>>, rounds: usize, per_round: u64) {
    for _ in 0..rounds {
        for key in 0..per_round {
            cache.set_with_cost(key, vec![0u8; 64], 64);
        }
        cache.on_memory_pressure();
    }
}

fn profile(name: &str, synchronous: bool) {
    println!("=== Profiling {} release ===", name);
    let count_limit = 4096;
    let operations = 100_000;
    let universe = 16_384;

    let cache: MemoryCache<u64, Vec<u8>> = MemoryCacheBuilder::new()
        .name(name)
        .count_limit(count_limit)
        .cost_limit(count_limit as u64 * 64)
        .auto_trim_interval(None)
        .release_asynchronously(!synchronous)
        .initial_capacity(count_limit)
        .build();

    for i in 0..count_limit as u64 {
        cache.set_with_cost(i, vec![0u8; 64], 64);
    }

    hotset_workload(&cache, operations, universe, 42);
    scan_workload(&cache, operations / 2, universe);
    clear_churn(&cache, 16, count_limit as u64);
    cache.drain_releases();

    println!("  Final size: {} (cost {})", cache.total_count(), cache.total_cost());
}

fn main() {
    let _profiler = dhat::Profiler::new_heap();

    println!("memkit DHAT Heap Profiling");
    println!("==========================\n");

    profile("synchronous", true);
    profile("background", false);

    println!("\n==========================");
    println!("Profile written to dhat-heap.json");
}
