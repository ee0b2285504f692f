use std::time::{Duration, Instant};

/// Internal wrapper that tracks when a value was inserted into the local tier.
/// Used for TTL expiration support.
///
/// Each cached value is wrapped in a `CacheEntry` which records the insertion
/// timestamp using `Instant::now()`. The TTL itself is owned by the tier, not
/// the entry, so a tier-wide TTL change (a new cache instance) never has to
/// rewrite entries.
///
/// # Examples
///
/// ```
/// use cachette_core::CacheEntry;
/// use std::time::Duration;
///
/// let entry = CacheEntry::new(42);
/// assert_eq!(entry.value, 42);
/// assert!(!entry.is_expired(Some(Duration::from_secs(60))));
/// assert!(!entry.is_expired(None));
/// ```
#[derive(Clone)]
pub struct CacheEntry<R> {
    pub value: R,
    pub inserted_at: Instant,
}

impl<R> CacheEntry<R> {
    /// Creates a new cache entry with the current timestamp.
    pub fn new(value: R) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    /// Returns true if the entry has expired based on the provided TTL.
    ///
    /// `None` means no expiration.
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => self.inserted_at.elapsed() >= ttl,
            None => false,
        }
    }
}
