// Tests for null-value handling on `Option` returns.
//
// By default a `None` result is not cached and gets recomputed; with
// `cache_null_value = true` the `None` itself becomes a cache entry,
// distinguishable from "never computed".

use cachette::{cached, configure, GlobalConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;

fn setup() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        configure(GlobalConfig::builder().build());
    });
}

// Test 1: default policy recomputes None

static DEFAULT_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached(name = "null-default")]
fn find_maybe(id: u32) -> Option<String> {
    DEFAULT_CALLS.fetch_add(1, Ordering::SeqCst);
    if id < 100 {
        Some(format!("row-{id}"))
    } else {
        None
    }
}

#[test]
fn test_none_not_cached_by_default() {
    setup();

    assert_eq!(find_maybe(500), None);
    assert_eq!(find_maybe(500), None);
    // the absent row was looked up twice
    assert_eq!(DEFAULT_CALLS.load(Ordering::SeqCst), 2);

    // present rows are cached normally
    assert_eq!(find_maybe(1), Some("row-1".to_string()));
    assert_eq!(find_maybe(1), Some("row-1".to_string()));
    assert_eq!(DEFAULT_CALLS.load(Ordering::SeqCst), 3);
}

// Test 2: opting in caches the None

static OPTED_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached(name = "null-opted", cache_null_value = true)]
fn find_maybe_cached_null(id: u32) -> Option<String> {
    OPTED_CALLS.fetch_add(1, Ordering::SeqCst);
    if id < 100 {
        Some(format!("row-{id}"))
    } else {
        None
    }
}

#[test]
fn test_none_cached_when_opted_in() {
    setup();

    assert_eq!(find_maybe_cached_null(500), None);
    assert_eq!(find_maybe_cached_null(500), None);
    // the None was served from cache on the second call
    assert_eq!(OPTED_CALLS.load(Ordering::SeqCst), 1);
}

// Test 3: the null policy also applies to Result<Option<..>, ..> returns

static FALLIBLE_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached(name = "null-fallible", cache_null_value = true)]
fn try_find(id: u32) -> Result<Option<String>, String> {
    FALLIBLE_CALLS.fetch_add(1, Ordering::SeqCst);
    if id == 0 {
        Err("bad id".to_string())
    } else if id < 100 {
        Ok(Some(format!("row-{id}")))
    } else {
        Ok(None)
    }
}

#[test]
fn test_ok_none_cached_when_opted_in() {
    setup();

    assert_eq!(try_find(700), Ok(None));
    assert_eq!(try_find(700), Ok(None));
    assert_eq!(FALLIBLE_CALLS.load(Ordering::SeqCst), 1);

    // an Err is never cached, whatever the null policy says
    assert!(try_find(0).is_err());
    assert!(try_find(0).is_err());
    assert_eq!(FALLIBLE_CALLS.load(Ordering::SeqCst), 3);
}
