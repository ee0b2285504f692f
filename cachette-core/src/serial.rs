use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ConfigError, TierError};

/// Serialization policy applied to values before they reach a remote store.
///
/// Policies are selected by name at declaration resolution time; an unknown
/// name is a [`ConfigError`], not a call-time failure.
///
/// # Examples
///
/// ```
/// use cachette_core::SerialPolicy;
///
/// let policy = SerialPolicy::from_name("json").unwrap();
/// let bytes = policy.serialize(&vec![1, 2, 3]).unwrap();
/// let back: Vec<i32> = policy.deserialize(&bytes).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialPolicy {
    /// Human-readable JSON via `serde_json`.
    Json,
    /// Compact binary via `bincode`.
    Bincode,
}

impl SerialPolicy {
    /// Looks up a policy by its registered name (`"json"` or `"bincode"`).
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name {
            "json" => Ok(SerialPolicy::Json),
            "bincode" => Ok(SerialPolicy::Bincode),
            other => Err(ConfigError::UnknownSerialPolicy(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SerialPolicy::Json => "json",
            SerialPolicy::Bincode => "bincode",
        }
    }

    pub fn serialize<V: Serialize>(&self, value: &V) -> Result<Vec<u8>, TierError> {
        match self {
            SerialPolicy::Json => {
                serde_json::to_vec(value).map_err(|e| TierError::Serialize(e.to_string()))
            }
            SerialPolicy::Bincode => {
                bincode::serialize(value).map_err(|e| TierError::Serialize(e.to_string()))
            }
        }
    }

    pub fn deserialize<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V, TierError> {
        match self {
            SerialPolicy::Json => {
                serde_json::from_slice(bytes).map_err(|e| TierError::Deserialize(e.to_string()))
            }
            SerialPolicy::Bincode => {
                bincode::deserialize(bytes).map_err(|e| TierError::Deserialize(e.to_string()))
            }
        }
    }
}
