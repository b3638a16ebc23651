// ==============================================
// RELEASE ROUTING TESTS (integration)
// ==============================================
//
// Checks where the final drop of a removed value runs for each release
// configuration, and that lifecycle signals route their batches the same way.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use memkit::builder::MemoryCacheBuilder;
use memkit::cache::MemoryCache;
use memkit::release::{DesignatedThread, ReleaseMode};

#[derive(Clone, Default)]
struct DropLog {
    drops: Arc<AtomicUsize>,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl DropLog {
    fn value(&self) -> Logged {
        Logged { log: self.clone() }
    }

    fn count(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap().clone()
    }
}

struct Logged {
    log: DropLog,
}

impl Drop for Logged {
    fn drop(&mut self) {
        self.log.drops.fetch_add(1, Ordering::SeqCst);
        self.log.threads.lock().unwrap().push(thread::current().id());
    }
}

fn fill(cache: &MemoryCache<u32, Logged>, log: &DropLog, n: u32) {
    for i in 0..n {
        cache.set(i, log.value());
    }
}

mod synchronous {
    use super::*;

    #[test]
    fn remove_drops_on_calling_thread() {
        let log = DropLog::default();
        let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
            .auto_trim_interval(None)
            .release_asynchronously(false)
            .build();
        assert_eq!(cache.release_mode(), ReleaseMode::Synchronous);

        fill(&cache, &log, 3);
        cache.remove(&0);
        cache.trim_to_count(1);
        assert_eq!(log.count(), 2);

        cache.remove_all();
        assert_eq!(log.count(), 3);
        let me = thread::current().id();
        assert!(log.threads().iter().all(|&id| id == me));
    }

    #[test]
    fn overwrite_releases_the_old_value() {
        let log = DropLog::default();
        let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
            .auto_trim_interval(None)
            .release_asynchronously(false)
            .build();
        cache.set(1, log.value());
        cache.set(1, log.value());
        assert_eq!(log.count(), 1);
        assert_eq!(cache.total_count(), 1);
    }
}

mod background {
    use super::*;

    #[test]
    fn remove_all_drops_off_the_calling_thread() {
        let log = DropLog::default();
        let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
            .name("routing")
            .auto_trim_interval(None)
            .build();
        assert_eq!(cache.release_mode(), ReleaseMode::Background);

        fill(&cache, &log, 100);
        cache.remove_all();
        assert!(cache.is_empty());
        cache.drain_releases();

        assert_eq!(log.count(), 100);
        let me = thread::current().id();
        assert!(log.threads().iter().all(|&id| id != me));
    }

    #[test]
    fn held_values_are_dropped_by_their_last_holder() {
        let log = DropLog::default();
        let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
            .auto_trim_interval(None)
            .build();
        cache.set(1, log.value());
        let held = cache.get(&1).unwrap();
        cache.remove(&1);
        cache.drain_releases();
        assert_eq!(log.count(), 0);

        drop(held);
        assert_eq!(log.count(), 1);
        assert_eq!(log.threads(), vec![thread::current().id()]);
    }
}

mod designated {
    use super::*;

    #[test]
    fn drops_wait_for_the_designated_thread() {
        let log = DropLog::default();
        let main = DesignatedThread::new();
        let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
            .auto_trim_interval(None)
            .release_on(Arc::new(main.clone()))
            .build();

        fill(&cache, &log, 5);
        cache.remove(&0);
        cache.trim_to_count(2);
        cache.remove_all();
        assert_eq!(log.count(), 0);
        assert_eq!(main.pending(), 3);

        let pump = thread::spawn(move || {
            main.run_pending();
            thread::current().id()
        });
        let pump_id = pump.join().unwrap();

        assert_eq!(log.count(), 5);
        assert!(log.threads().iter().all(|&id| id == pump_id));
    }

    #[test]
    fn designated_wins_over_synchronous() {
        let log = DropLog::default();
        let main = DesignatedThread::new();
        let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
            .auto_trim_interval(None)
            .release_asynchronously(false)
            .release_on(Arc::new(main.clone()))
            .build();
        cache.set(1, log.value());
        cache.remove(&1);
        assert_eq!(log.count(), 0);
        assert_eq!(main.run_pending(), 1);
        assert_eq!(log.count(), 1);
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn memory_pressure_routes_through_the_release_path() {
        let log = DropLog::default();
        let main = DesignatedThread::new();
        let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
            .auto_trim_interval(None)
            .release_on(Arc::new(main.clone()))
            .build();
        fill(&cache, &log, 4);

        cache.on_memory_pressure();
        assert!(cache.is_empty());
        assert_eq!(log.count(), 0);
        main.run_pending();
        assert_eq!(log.count(), 4);
    }

    #[test]
    fn background_transition_toggle_is_live() {
        let log = DropLog::default();
        let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
            .auto_trim_interval(None)
            .release_asynchronously(false)
            .build();
        fill(&cache, &log, 4);

        cache.set_remove_all_on_background_transition(false);
        cache.on_background_transition();
        assert_eq!(cache.total_count(), 4);

        cache.set_remove_all_on_background_transition(true);
        cache.on_background_transition();
        assert!(cache.is_empty());
        assert_eq!(log.count(), 4);
    }
}

mod teardown {
    use super::*;

    #[test]
    fn dropping_a_designated_cache_defers_resident_values() {
        let log = DropLog::default();
        let main = DesignatedThread::new();
        {
            let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
                .auto_trim_interval(None)
                .release_on(Arc::new(main.clone()))
                .build();
            fill(&cache, &log, 5);
        }
        assert_eq!(log.count(), 0);
        assert!(main.pending() > 0);

        let pump = thread::spawn(move || {
            main.run_pending();
            thread::current().id()
        });
        let pump_id = pump.join().unwrap();
        assert_eq!(log.count(), 5);
        assert!(log.threads().iter().all(|&id| id == pump_id));
    }

    #[test]
    fn dropping_a_background_cache_drops_resident_values_on_the_worker() {
        let log = DropLog::default();
        {
            let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
                .auto_trim_interval(None)
                .build();
            fill(&cache, &log, 5);
        }
        // The worker is joined during teardown, so every drop has happened.
        assert_eq!(log.count(), 5);
        let me = thread::current().id();
        assert!(log.threads().iter().all(|&id| id != me));
    }

    #[test]
    fn dropping_a_synchronous_cache_drops_on_the_dropping_thread() {
        let log = DropLog::default();
        {
            let cache: MemoryCache<u32, Logged> = MemoryCacheBuilder::new()
                .auto_trim_interval(None)
                .release_asynchronously(false)
                .build();
            fill(&cache, &log, 3);
        }
        assert_eq!(log.count(), 3);
        let me = thread::current().id();
        assert!(log.threads().iter().all(|&id| id == me));
    }
}
