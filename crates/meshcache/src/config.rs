//! Group and registry configuration

use serde::{Deserialize, Serialize};

/// Default byte bound for a group's local store (64 MiB)
pub const DEFAULT_CACHE_BYTES: usize = 64 << 20;

/// Settings for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Registry name, unique per registry
    pub name: String,

    /// Byte bound for the local store (0 = unbounded)
    pub cache_bytes: usize,
}

impl GroupConfig {
    /// Config for `name` with the default cache size
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the byte bound for the local store
    pub fn cache_bytes(mut self, cache_bytes: usize) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            cache_bytes: DEFAULT_CACHE_BYTES,
        }
    }
}

/// What to do when a group is created under a name already in use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Replace the registered group with the new one
    #[default]
    Overwrite,

    /// Refuse the new group and keep the registered one
    Reject,
}

/// Settings for a group registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Handling of duplicate group names
    pub on_duplicate: DuplicatePolicy,
}
