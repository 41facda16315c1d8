//! # meshstore
//!
//! In-memory building blocks for MeshCache groups.
//!
//! ## Architecture
//! - **ByteView**: immutable, cheaply cloned snapshot of value bytes
//! - **LRU List**: slab-backed doubly-linked list, bounded by total weight
//! - **BoundedStore**: mutex-guarded LRU keyed by string, sized in bytes

#![warn(missing_docs)]

mod byteview;
mod lru;
mod store;

pub use byteview::ByteView;
pub use lru::LruCache;
pub use store::{entry_size, BoundedStore, ENTRY_OVERHEAD};
