#![no_main]

use std::sync::Arc;
use std::time::Instant;

use libfuzzer_sys::fuzz_target;
use memkit::ds::RecencyList;
use memkit::entry::Entry;

// Fuzz arbitrary operation sequences on RecencyList
//
// Tests random sequences of push_front, move_to_front, remove and pop_back,
// checking links in both directions after every step.
fuzz_target!(|data: &[u8]| {
    let now = Instant::now();
    let mut list: RecencyList<u32, u32> = RecencyList::new();
    let mut all_ids = Vec::new();

    for pair in data.chunks_exact(2) {
        let op = pair[0] % 4;
        let value = u32::from(pair[1]);

        match op {
            0 => {
                let id = list.push_front(Entry::new(value, Arc::new(value), 1, now));
                all_ids.push(id);
                assert_eq!(list.front_id(), Some(id));
            }
            1 => {
                if !all_ids.is_empty() {
                    let id = all_ids[(value as usize) % all_ids.len()];
                    if list.move_to_front(id) {
                        assert_eq!(list.front_id(), Some(id));
                    }
                }
            }
            2 => {
                if !all_ids.is_empty() {
                    let id = all_ids.swap_remove((value as usize) % all_ids.len());
                    let old_len = list.len();
                    if list.remove(id).is_some() {
                        assert_eq!(list.len(), old_len - 1);
                        assert!(!list.contains(id));
                    }
                }
            }
            _ => {
                let old_len = list.len();
                let tail = list.back_id();
                match list.pop_back() {
                    Some(_) => {
                        assert_eq!(list.len(), old_len - 1);
                        if let Some(id) = tail {
                            all_ids.retain(|&other| other != id);
                        }
                    }
                    None => assert!(list.is_empty()),
                }
            }
        }

        assert!(list.check_invariants().is_ok());
        assert_eq!(list.iter().count(), list.len());
        assert_eq!(list.iter_rev().count(), list.len());
    }
});
