//! # meshcache
//!
//! Read-through cache groups for a distributed cache node.
//!
//! ## Architecture
//! - **Group**: local [`BoundedStore`](meshstore::BoundedStore) in front of a
//!   user [`Loader`], with optional delegation of misses to the owning peer
//! - **Coalescer**: concurrent misses for one key share a single load
//! - **Registry**: explicit name → group map, owned by the embedding program
//!
//! ## Example
//!
//! ```
//! use meshcache::{loader_fn, Registry};
//!
//! let registry = Registry::new();
//! let group = registry
//!     .new_group("scores", 2 << 10, loader_fn(|key| Ok(key.as_bytes().to_vec())))
//!     .unwrap();
//!
//! assert_eq!(group.get("Tom").unwrap().to_string(), "Tom");
//! assert!(registry.get_group("scores").is_some());
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod flight;
mod group;
mod peers;
mod registry;
mod stats;

pub use config::{DuplicatePolicy, GroupConfig, RegistryConfig, DEFAULT_CACHE_BYTES};
pub use error::{BoxError, Error, LoadError, Result};
pub use flight::Coalescer;
pub use group::Group;
pub use meshstore::ByteView;
pub use peers::{loader_fn, Loader, PeerFetcher, PeerPicker};
pub use registry::Registry;
pub use stats::GroupStats;
