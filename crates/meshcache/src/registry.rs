//! Named registry of groups
//!
//! Owned by whoever composes the process and handed to anything that needs
//! to find a group by name. Independent registries never share groups.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::RwLock;
use tracing::info;

use crate::config::{DuplicatePolicy, GroupConfig, RegistryConfig};
use crate::error::{Error, Result};
use crate::group::Group;
use crate::peers::Loader;

/// Name → [`Group`] registry.
///
/// Groups are never removed. Creating a group under a name already in use
/// follows the configured [`DuplicatePolicy`].
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>, RandomState>>,
    config: RegistryConfig,
}

impl Registry {
    /// Create an empty registry that overwrites duplicate names
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with the given settings
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            groups: RwLock::new(HashMap::with_hasher(RandomState::new())),
            config,
        }
    }

    /// Create a group and register it under `name`
    ///
    /// # Arguments
    /// * `name` - Registry name
    /// * `cache_bytes` - Byte bound for the group's local store (0 = unbounded)
    /// * `loader` - Data source consulted on misses
    ///
    /// # Returns
    /// * `Result<Arc<Group>>` - The registered group, or
    ///   `Error::DuplicateGroup` when the name is taken and duplicates are
    ///   rejected
    pub fn new_group(
        &self,
        name: impl Into<String>,
        cache_bytes: usize,
        loader: impl Loader + 'static,
    ) -> Result<Arc<Group>> {
        self.register(Group::new(name, cache_bytes, loader))
    }

    /// Create a group from config and register it
    pub fn create_group(
        &self,
        config: &GroupConfig,
        loader: impl Loader + 'static,
    ) -> Result<Arc<Group>> {
        self.register(Group::from_config(config, loader))
    }

    fn register(&self, group: Group) -> Result<Arc<Group>> {
        let group = Arc::new(group);
        let mut groups = self.groups.write();

        if groups.contains_key(group.name()) {
            match self.config.on_duplicate {
                DuplicatePolicy::Reject => {
                    return Err(Error::DuplicateGroup(group.name().to_owned()));
                }
                DuplicatePolicy::Overwrite => {
                    info!(group = %group.name(), "replacing registered group");
                }
            }
        } else {
            info!(
                group = %group.name(),
                cache_bytes = group.max_cache_bytes(),
                "registered group"
            );
        }

        groups.insert(group.name().to_owned(), Arc::clone(&group));
        Ok(group)
    }

    /// Look up a group by name
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Names of all registered groups, sorted
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered groups
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Check if no groups are registered
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Duplicate-name handling in effect
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.config.on_duplicate
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.group_names())
            .field("on_duplicate", &self.config.on_duplicate)
            .finish()
    }
}
