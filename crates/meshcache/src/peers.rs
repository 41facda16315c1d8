//! Capabilities a group consumes: the data source and peer routing
//!
//! Transports and key-to-peer hashing live outside this crate; they plug in
//! through these traits.

use std::sync::Arc;

use crate::error::BoxError;

/// Source of truth consulted when a key misses every cache.
///
/// Any `Fn(&str) -> Result<Vec<u8>, BoxError>` closure is a `Loader`.
pub trait Loader: Send + Sync {
    /// Produce the bytes for `key`
    fn load(&self, key: &str) -> Result<Vec<u8>, BoxError>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    fn load(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        self(key)
    }
}

/// Pin a closure to the [`Loader`] signature so its argument and error
/// types are inferred.
pub fn loader_fn<F>(f: F) -> F
where
    F: Fn(&str) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
    f
}

/// Chooses which peer owns a key.
///
/// Selection is pure: no I/O. `None` means the key is handled locally,
/// including when the local node is the owner.
pub trait PeerPicker: Send + Sync {
    /// Peer responsible for `key`, if it is not this node
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}

/// Handle to a remote node that can serve group lookups.
pub trait PeerFetcher: Send + Sync {
    /// Fetch `key` from the peer's copy of `group`
    fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>, BoxError>;
}
