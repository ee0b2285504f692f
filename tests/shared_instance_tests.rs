// Tests for cache sharing: two declarations with the same explicit
// `(area, name)` operate on a single cache instance.

use cachette::{cached, configure, GlobalConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Once;

fn setup() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        configure(GlobalConfig::builder().build());
    });
}

static PRIMARY_CALLS: AtomicU32 = AtomicU32::new(0);
static MIRROR_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached(name = "shared-codes", key = "code")]
fn primary_lookup(code: u32) -> String {
    PRIMARY_CALLS.fetch_add(1, Ordering::SeqCst);
    format!("primary-{code}")
}

#[cached(name = "shared-codes", key = "code")]
fn mirror_lookup(code: u32) -> String {
    MIRROR_CALLS.fetch_add(1, Ordering::SeqCst);
    format!("mirror-{code}")
}

#[test]
fn test_shared_name_shares_entries() {
    setup();

    // populate through the first function
    assert_eq!(primary_lookup(5), "primary-5");
    assert_eq!(PRIMARY_CALLS.load(Ordering::SeqCst), 1);

    // the second function sees the entry the first one wrote
    assert_eq!(mirror_lookup(5), "primary-5");
    assert_eq!(MIRROR_CALLS.load(Ordering::SeqCst), 0);

    // and vice versa for a key the second function populates
    assert_eq!(mirror_lookup(6), "mirror-6");
    assert_eq!(primary_lookup(6), "mirror-6");
    assert_eq!(PRIMARY_CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_registry_exposes_one_instance() {
    setup();

    primary_lookup(70);
    let first = cachette::registry::lookup("default", "shared-codes").expect("instance exists");
    mirror_lookup(71);
    let second = cachette::registry::lookup("default", "shared-codes").expect("instance exists");
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

// Distinct auto-derived names stay distinct: two unnamed functions never
// cross-talk.

static LEFT_CALLS: AtomicU32 = AtomicU32::new(0);
static RIGHT_CALLS: AtomicU32 = AtomicU32::new(0);

#[cached]
fn left(x: u32) -> u32 {
    LEFT_CALLS.fetch_add(1, Ordering::SeqCst);
    x + 1
}

#[cached]
fn right(x: u32) -> u32 {
    RIGHT_CALLS.fetch_add(1, Ordering::SeqCst);
    x + 2
}

#[test]
fn test_auto_named_caches_are_independent() {
    setup();

    assert_eq!(left(1), 2);
    assert_eq!(right(1), 3);
    assert_eq!(left(1), 2);
    assert_eq!(right(1), 3);
    assert_eq!(LEFT_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(RIGHT_CALLS.load(Ordering::SeqCst), 1);
}

// Two same-named inherent methods in one module are distinct sites: they
// share a module path and a function name but not a source location, and
// one must never be served the other's values.

struct Celsius;
struct Fahrenheit;

impl Celsius {
    #[cached]
    fn label(&self, degrees: i32) -> String {
        format!("{degrees}C")
    }
}

impl Fahrenheit {
    #[cached]
    fn label(&self, degrees: i32) -> String {
        format!("{degrees}F")
    }
}

#[test]
fn test_same_named_methods_never_cross_talk() {
    setup();

    assert_eq!(Celsius.label(20), "20C");
    assert_eq!(Fahrenheit.label(20), "20F");
    assert_eq!(Celsius.label(20), "20C");
    assert_eq!(Fahrenheit.label(20), "20F");
}
