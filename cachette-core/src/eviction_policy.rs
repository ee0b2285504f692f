use std::cmp::PartialEq;

/// Represents the policy used for evicting elements from the local tier when
/// it reaches its element-count limit.
///
/// # Variants
///
/// * `FIFO` - **First In, First Out** eviction policy
///   - Elements are evicted in the order they were inserted
///   - Accessing a cached value does NOT change its position
///   - O(1) eviction performance
///
/// * `LRU` - **Least Recently Used** eviction policy (default)
///   - The least recently accessed element is removed first
///   - Accessing a cached value moves it to the "most recent" position
///   - Better for workloads with temporal locality
///   - O(n) overhead on cache hits for reordering
///
/// * `Random` - **Random replacement** eviction policy
///   - A randomly selected element is removed
///   - No bookkeeping on cache hits
///
/// # Examples
///
/// ```
/// use cachette_core::EvictionPolicy;
///
/// let default_policy = EvictionPolicy::default();
/// assert_eq!(default_policy, EvictionPolicy::LRU);
///
/// let policy: EvictionPolicy = "fifo".into();
/// assert_eq!(policy, EvictionPolicy::FIFO);
/// ```
#[derive(Clone, Copy, Debug)]
pub enum EvictionPolicy {
    FIFO,
    LRU,
    Random,
}

impl EvictionPolicy {
    /// Returns the default eviction policy (LRU).
    pub const fn default() -> Self {
        EvictionPolicy::LRU
    }
}

/// Converts a string slice to an `EvictionPolicy`.
///
/// The conversion is case-insensitive and defaults to LRU for unrecognized
/// values.
impl From<&str> for EvictionPolicy {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "fifo" => EvictionPolicy::FIFO,
            "random" => EvictionPolicy::Random,
            _ => EvictionPolicy::LRU,
        }
    }
}

impl PartialEq for EvictionPolicy {
    fn eq(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (EvictionPolicy::FIFO, EvictionPolicy::FIFO)
                | (EvictionPolicy::LRU, EvictionPolicy::LRU)
                | (EvictionPolicy::Random, EvictionPolicy::Random)
        )
    }
}
