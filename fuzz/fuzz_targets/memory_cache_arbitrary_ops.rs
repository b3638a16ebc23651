#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use memkit::builder::MemoryCacheBuilder;
use memkit::cache::MemoryCache;

// Fuzz arbitrary operation sequences on MemoryCache
//
// Tests random sequences of set, get, remove and the trim family, checking
// aggregates against the index after every step.
fuzz_target!(|data: &[u8]| {
    let cache: MemoryCache<u8, u8> = MemoryCacheBuilder::new()
        .auto_trim_interval(None)
        .release_asynchronously(false)
        .build();

    for pair in data.chunks_exact(2) {
        let op = pair[0] % 8;
        let arg = pair[1];

        match op {
            0 | 1 => cache.set_with_cost(arg, arg, u64::from(arg % 16)),
            2 => {
                if let Some(value) = cache.get(&arg) {
                    assert_eq!(*value, arg);
                    assert_eq!(cache.keys().first(), Some(&arg));
                }
            }
            3 => {
                cache.remove(&arg);
                assert!(!cache.contains_key(&arg));
            }
            4 => {
                cache.trim_to_count(usize::from(arg % 32));
                assert!(cache.total_count() <= usize::from(arg % 32));
            }
            5 => {
                cache.trim_to_cost(u64::from(arg));
                assert!(cache.total_cost() <= u64::from(arg));
            }
            6 => cache.trim_to_age(Duration::from_secs(u64::from(arg))),
            _ => {
                cache.remove_all();
                assert!(cache.is_empty());
            }
        }

        assert!(cache.check_invariants().is_ok());
        assert_eq!(cache.keys().len(), cache.total_count());
    }
});
