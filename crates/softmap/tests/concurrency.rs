use std::sync::Arc;
use std::thread;

use softmap::{SoftMap, SoftMapConfig};

const THREADS: usize = 8;
const KEYS: usize = 256;

#[test]
fn concurrent_writers_and_readers() {
    let map: Arc<SoftMap<usize, usize>> = Arc::new(SoftMap::with_capacity(KEYS));

    thread::scope(|scope| {
        for t in 0..THREADS {
            let map = Arc::clone(&map);
            scope.spawn(move || {
                for i in (t..KEYS).step_by(THREADS) {
                    map.put_soft(i, i * 2);
                }
            });
        }
    });

    thread::scope(|scope| {
        for _ in 0..THREADS {
            let map = Arc::clone(&map);
            scope.spawn(move || {
                for i in 0..KEYS {
                    assert_eq!(map.get_soft(&i).as_deref(), Some(&(i * 2)));
                }
            });
        }
    });

    assert_eq!(map.len(), KEYS);
}

#[test]
fn reads_racing_reclaim_never_see_wrong_values() {
    let config = SoftMapConfig::with_capacity(KEYS).concurrency_level(THREADS);
    let map: Arc<SoftMap<usize, usize>> = Arc::new(SoftMap::with_config(config).unwrap());
    for i in 0..KEYS {
        map.put_soft(i, i);
    }

    thread::scope(|scope| {
        for t in 0..THREADS / 2 {
            let map = Arc::clone(&map);
            scope.spawn(move || {
                for i in (t..KEYS).step_by(THREADS / 2) {
                    map.reclaim(&i);
                }
            });
        }
        for _ in 0..THREADS / 2 {
            let map = Arc::clone(&map);
            scope.spawn(move || {
                for round in 0..4 {
                    for i in 0..KEYS {
                        if let Some(value) = map.get_soft(&i) {
                            assert_eq!(*value, i, "round {round}");
                        }
                    }
                }
            });
        }
    });

    // Every value is gone; reading each key once cleans the table up.
    for i in 0..KEYS {
        assert_eq!(map.get_soft(&i), None);
    }
    assert!(map.is_empty());
    assert!(map.stats().sweeps() >= 1);
}

#[test]
fn reinsert_after_reclaim_under_contention() {
    let map: Arc<SoftMap<usize, usize>> = Arc::new(SoftMap::new());

    thread::scope(|scope| {
        for t in 0..THREADS {
            let map = Arc::clone(&map);
            scope.spawn(move || {
                for round in 0..200 {
                    let key = round % 16;
                    if t % 2 == 0 {
                        map.put_soft_if_absent(key, key);
                    } else {
                        map.reclaim(&key);
                    }
                    if let Some(value) = map.get_soft(&key) {
                        assert_eq!(*value, key);
                    }
                }
            });
        }
    });

    for key in 0..16 {
        map.put_soft_if_absent(key, key);
        assert_eq!(map.get_soft(&key).as_deref(), Some(&key));
    }
}

#[test]
fn get_or_insert_returns_one_value_per_key() {
    let map: Arc<SoftMap<&'static str, usize>> = Arc::new(SoftMap::new());

    let results: Vec<Arc<usize>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let map = Arc::clone(&map);
                scope.spawn(move || map.get_or_insert_soft_with("shared", || t))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &results[0];
    assert!(results.iter().all(|value| Arc::ptr_eq(value, first)));
}
