//! Property-Based Tests for the memory tier
//!
//! Uses proptest to check the capacity, accounting, expiration and LRU
//! guarantees over arbitrary operation sequences.

use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::{estimated_size, MemoryCache};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const TEST_MAX_SIZE: u64 = 64 * 1024;

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,256}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    SetExpired { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

/// Keys drawn from a small pool so that overwrites and hits actually happen.
fn pooled_key_strategy() -> impl Strategy<Value = String> {
    (0u8..24).prop_map(|i| format!("key_{}", i))
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (pooled_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        1 => (pooled_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::SetExpired { key, value }),
        3 => pooled_key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => pooled_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn unique(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // For any operation sequence, after every call the entry count and the
    // tracked size stay within limits and the tracked size equals the sum of
    // the entries' sizes.
    #[test]
    fn prop_limits_and_accounting_hold(
        ops in prop::collection::vec(cache_op_strategy(), 1..120),
        max_entries in 1usize..16,
        max_size in 64u64..1024,
    ) {
        let cache: MemoryCache<String> = MemoryCache::new(max_entries, max_size, None).unwrap();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(&key, value, None, None);
                }
                CacheOp::SetExpired { key, value } => {
                    cache.set(&key, value, Some(Duration::ZERO), None);
                }
                CacheOp::Get { key } => {
                    cache.get(&key);
                }
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                }
            }

            let stats = cache.stats();
            prop_assert!(stats.entry_count <= max_entries);
            prop_assert!(stats.total_size_bytes <= max_size);
            prop_assert_eq!(stats.total_size_bytes, cache.recomputed_size());
        }
    }

    // Hits and misses reported by stats match what the caller observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache: MemoryCache<String> =
            MemoryCache::new(TEST_MAX_ENTRIES, TEST_MAX_SIZE, None).unwrap();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(&key, value, None, None);
                }
                CacheOp::SetExpired { key, value } => {
                    cache.set(&key, value, Some(Duration::ZERO), None);
                }
                CacheOp::Get { key } => match cache.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.counters.hits, expected_hits);
        prop_assert_eq!(stats.counters.misses, expected_misses);
        prop_assert_eq!(stats.entry_count, cache.len());
    }

    // Storing a value and reading it back returns the same value.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in valid_value_strategy()) {
        let cache: MemoryCache<String> =
            MemoryCache::new(TEST_MAX_ENTRIES, TEST_MAX_SIZE, None).unwrap();

        prop_assert!(cache.set(&key, value.clone(), None, None));
        prop_assert_eq!(cache.get(&key), Some(value.clone()));
        prop_assert_eq!(cache.stats().total_size_bytes, estimated_size(&value));
    }

    // The second of two writes to a key wins, and only one entry remains.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let cache: MemoryCache<String> =
            MemoryCache::new(TEST_MAX_ENTRIES, TEST_MAX_SIZE, None).unwrap();

        cache.set(&key, value1, None, None);
        cache.set(&key, value2.clone(), None, None);

        prop_assert_eq!(cache.get(&key), Some(value2.clone()));
        prop_assert_eq!(cache.len(), 1);
        prop_assert_eq!(cache.stats().total_size_bytes, value2.len() as u64);
    }

    // An entry written with a zero TTL is never returned.
    #[test]
    fn prop_zero_ttl_never_returned(key in valid_key_strategy(), value in valid_value_strategy()) {
        let cache: MemoryCache<String> =
            MemoryCache::new(TEST_MAX_ENTRIES, TEST_MAX_SIZE, Some(Duration::from_secs(300))).unwrap();

        cache.set(&key, value, Some(Duration::ZERO), None);

        prop_assert_eq!(cache.get(&key), None);
        prop_assert!(cache.is_empty());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Filling the cache to exactly its entry limit and inserting one more key
    // evicts the first key inserted and nothing else.
    #[test]
    fn prop_lru_eviction_order(
        initial_keys in prop::collection::vec(valid_key_strategy(), 3..10),
        new_key in valid_key_strategy(),
        new_value in valid_value_strategy()
    ) {
        let unique_keys = unique(initial_keys);
        prop_assume!(unique_keys.len() >= 2);
        prop_assume!(!unique_keys.contains(&new_key));

        let capacity = unique_keys.len();
        let cache: MemoryCache<String> = MemoryCache::new(capacity, TEST_MAX_SIZE, None).unwrap();

        for key in &unique_keys {
            cache.set(key, format!("value_{}", key), None, None);
        }
        prop_assert_eq!(cache.len(), capacity);

        cache.set(&new_key, new_value, None, None);

        prop_assert_eq!(cache.len(), capacity);
        prop_assert!(!cache.contains(&unique_keys[0]), "Oldest key should have been evicted");
        prop_assert!(cache.contains(&new_key));
        for key in unique_keys.iter().skip(1) {
            prop_assert!(cache.contains(key), "Key '{}' should still exist", key);
        }
    }

    // Reading the oldest key before the overflow insert protects it; the
    // next oldest goes instead.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::vec(valid_key_strategy(), 3..8),
        new_key in valid_key_strategy(),
        new_value in valid_value_strategy()
    ) {
        let unique_keys = unique(keys);
        prop_assume!(unique_keys.len() >= 3);
        prop_assume!(!unique_keys.contains(&new_key));

        let capacity = unique_keys.len();
        let cache: MemoryCache<String> = MemoryCache::new(capacity, TEST_MAX_SIZE, None).unwrap();

        for key in &unique_keys {
            cache.set(key, format!("value_{}", key), None, None);
        }

        let accessed_key = unique_keys[0].clone();
        prop_assert!(cache.get(&accessed_key).is_some());

        cache.set(&new_key, new_value, None, None);

        prop_assert!(cache.contains(&accessed_key), "Accessed key should not be evicted");
        prop_assert!(!cache.contains(&unique_keys[1]), "Next oldest key should be evicted");
        prop_assert!(cache.contains(&new_key));
    }
}
