// Tests for local-tier bounds and expiration through the macro.

use cachette::{cached, configure, GlobalConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;
use std::thread;
use std::time::Duration;

fn setup() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        configure(GlobalConfig::builder().build());
    });
}

static LIMIT_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached(name = "evict-limit", local_limit = 2, key = "id")]
fn bounded(id: u32) -> u32 {
    LIMIT_CALLS.fetch_add(1, Ordering::SeqCst);
    id * 10
}

#[test]
fn test_local_limit_evicts_oldest() {
    setup();

    bounded(1);
    bounded(2);
    assert_eq!(LIMIT_CALLS.load(Ordering::SeqCst), 2);

    // the third distinct key pushes the first one out (LRU default)
    bounded(3);
    assert_eq!(LIMIT_CALLS.load(Ordering::SeqCst), 3);

    assert_eq!(bounded(1), 10);
    assert_eq!(LIMIT_CALLS.load(Ordering::SeqCst), 4);
}

static TTL_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached(name = "evict-ttl", expire = 1, key = "id")]
fn short_lived(id: u32) -> u32 {
    TTL_CALLS.fetch_add(1, Ordering::SeqCst);
    id + 5
}

#[test]
fn test_entries_expire() {
    setup();

    assert_eq!(short_lived(1), 6);
    assert_eq!(short_lived(1), 6);
    assert_eq!(TTL_CALLS.load(Ordering::SeqCst), 1);

    thread::sleep(Duration::from_millis(1200));

    assert_eq!(short_lived(1), 6);
    assert_eq!(TTL_CALLS.load(Ordering::SeqCst), 2);
}
