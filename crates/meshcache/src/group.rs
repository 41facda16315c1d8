//! Group: a named read-through cache namespace

use std::fmt;
use std::sync::{Arc, OnceLock};

use meshstore::{BoundedStore, ByteView};
use tracing::{debug, warn};

use crate::config::GroupConfig;
use crate::error::{BoxError, Error, LoadError, Result};
use crate::flight::Coalescer;
use crate::peers::{Loader, PeerFetcher, PeerPicker};
use crate::stats::GroupStats;

/// Read-through cache namespace.
///
/// Lookups are answered from the local store when possible. Misses for the
/// same key are collapsed into one resolution, which asks the owning peer
/// first (when a picker is registered and names one) and otherwise calls the
/// loader. Only locally loaded values are written to the local store.
pub struct Group {
    /// Registry name
    name: String,

    /// Data source for misses
    loader: Box<dyn Loader>,

    /// Local store for values this node loaded itself
    main_cache: BoundedStore,

    /// Peer routing, attached at most once
    peers: OnceLock<Arc<dyn PeerPicker>>,

    /// Deduplicates concurrent misses per key
    flight: Coalescer<Result<ByteView>>,

    /// Lookup statistics
    stats: GroupStats,
}

impl Group {
    /// Create a standalone group
    ///
    /// # Arguments
    /// * `name` - Group name, passed to peers on delegated fetches
    /// * `cache_bytes` - Byte bound for the local store (0 = unbounded)
    /// * `loader` - Data source consulted on misses
    pub fn new(name: impl Into<String>, cache_bytes: usize, loader: impl Loader + 'static) -> Self {
        Self::with_loader(name.into(), cache_bytes, Box::new(loader))
    }

    /// Create a standalone group from config
    pub fn from_config(config: &GroupConfig, loader: impl Loader + 'static) -> Self {
        Self::with_loader(config.name.clone(), config.cache_bytes, Box::new(loader))
    }

    fn with_loader(name: String, cache_bytes: usize, loader: Box<dyn Loader>) -> Self {
        Self {
            name,
            loader,
            main_cache: BoundedStore::new(cache_bytes),
            peers: OnceLock::new(),
            flight: Coalescer::new(),
            stats: GroupStats::new(),
        }
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach peer routing.
    ///
    /// # Panics
    ///
    /// Panics if peers were already registered for this group.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) {
        if self.peers.set(peers).is_err() {
            panic!("register_peers called more than once for group {:?}", self.name);
        }
    }

    /// Get the value for `key` from the local store, a peer, or the loader
    ///
    /// # Returns
    /// * `Result<ByteView>` - The value, `Error::EmptyKey` for an empty key,
    ///   or the loader's error when the value could not be produced
    pub fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        self.stats.record_get();

        if let Some(value) = self.main_cache.get(key) {
            self.stats.record_hit();
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        self.stats.record_load();
        self.load(key)
    }

    fn load(&self, key: &str) -> Result<ByteView> {
        let (result, shared) = self.flight.run(key, || {
            // A load that finished between our miss and this call already
            // filled the store.
            if let Some(value) = self.main_cache.get(key) {
                return Ok(value);
            }

            if let Some(peer) = self.peers.get().and_then(|peers| peers.pick_peer(key)) {
                match self.get_from_peer(peer.as_ref(), key) {
                    Ok(value) => return Ok(value),
                    Err(e) => {
                        self.stats.record_peer_error();
                        warn!(group = %self.name, key, error = %e, "failed to get from peer, loading locally");
                    }
                }
            }

            self.get_locally(key)
        });

        if shared {
            self.stats.record_coalesced();
        }
        result
    }

    // Peer-served values are not stored locally; the peer owns them.
    fn get_from_peer(
        &self,
        peer: &dyn PeerFetcher,
        key: &str,
    ) -> std::result::Result<ByteView, BoxError> {
        let bytes = peer.fetch(&self.name, key)?;
        self.stats.record_peer_load();
        Ok(ByteView::from(bytes))
    }

    fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = match self.loader.load(key) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_local_load_error();
                return Err(Error::Load(LoadError::from(e)));
            }
        };
        self.stats.record_local_load();
        debug!(group = %self.name, key, bytes = bytes.len(), "loaded locally");

        let value = ByteView::from(bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        let evicted = self.main_cache.add(key, value);
        self.stats.record_evictions(evicted);
    }

    /// Get lookup statistics
    pub fn stats(&self) -> &GroupStats {
        &self.stats
    }

    /// Number of entries in the local store
    pub fn cache_len(&self) -> usize {
        self.main_cache.len()
    }

    /// Estimated bytes held by the local store
    pub fn cache_bytes(&self) -> usize {
        self.main_cache.used_bytes()
    }

    /// Byte bound of the local store (0 = unbounded)
    pub fn max_cache_bytes(&self) -> usize {
        self.main_cache.max_bytes()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("main_cache", &self.main_cache)
            .field("has_peers", &self.peers.get().is_some())
            .field("in_flight", &self.flight.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::loader_fn;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Loader that serves `key` -> "v-<key>" and counts calls.
    fn counting_loader(calls: Arc<AtomicUsize>) -> impl Loader {
        loader_fn(move |key| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("v-{}", key).into_bytes())
        })
    }

    struct StaticPeer(&'static str);

    impl PeerFetcher for StaticPeer {
        fn fetch(&self, _group: &str, _key: &str) -> std::result::Result<Vec<u8>, BoxError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    struct FailingPeer {
        calls: AtomicUsize,
    }

    impl PeerFetcher for FailingPeer {
        fn fetch(&self, _group: &str, _key: &str) -> std::result::Result<Vec<u8>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("peer unreachable".into())
        }
    }

    /// Routes every key to the same peer.
    struct AlwaysPick(Arc<dyn PeerFetcher>);

    impl PeerPicker for AlwaysPick {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerFetcher>> {
            Some(Arc::clone(&self.0))
        }
    }

    struct NeverPick;

    impl PeerPicker for NeverPick {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerFetcher>> {
            None
        }
    }

    /// Peer that blocks every fetch until `gate` opens.
    struct GatedPeer {
        calls: AtomicUsize,
        gate: AtomicBool,
        reply: std::result::Result<&'static str, &'static str>,
    }

    impl GatedPeer {
        fn new(reply: std::result::Result<&'static str, &'static str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: AtomicBool::new(false),
                reply,
            }
        }
    }

    impl PeerFetcher for GatedPeer {
        fn fetch(&self, _group: &str, _key: &str) -> std::result::Result<Vec<u8>, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            while !self.gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            match self.reply {
                Ok(value) => Ok(value.as_bytes().to_vec()),
                Err(msg) => Err(msg.into()),
            }
        }
    }

    fn spawn_gets(
        group: &Arc<Group>,
        key: &'static str,
        n: usize,
    ) -> Vec<thread::JoinHandle<Result<ByteView>>> {
        (0..n)
            .map(|_| {
                let group = Arc::clone(group);
                thread::spawn(move || group.get(key))
            })
            .collect()
    }

    /// Spin until `n` callers are parked on the in-flight load for `key`.
    fn park_waiters(group: &Group, key: &str, n: usize) {
        while group.flight.waiting(key) < n {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_group_empty_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Group::new("images", 1000, counting_loader(Arc::clone(&calls)));
        let peer = Arc::new(FailingPeer { calls: AtomicUsize::new(0) });
        group.register_peers(Arc::new(AlwaysPick(peer.clone())));

        let err = group.get("").unwrap_err();

        assert!(matches!(err, Error::EmptyKey));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(peer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(group.stats().gets(), 0);
    }

    #[test]
    fn test_group_load_then_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Group::new("images", 1000, counting_loader(Arc::clone(&calls)));

        let first = group.get("k1").unwrap();
        assert_eq!(first.to_string(), "v-k1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = group.get("k1").unwrap();
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(group.cache_len(), 1);
        assert_eq!(group.stats().hits(), 1);
        assert_eq!(group.stats().loads(), 1);
        assert_eq!(group.stats().local_loads(), 1);
    }

    #[test]
    fn test_group_concurrent_misses_load_once() {
        const CALLERS: usize = 1000;

        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(AtomicBool::new(false));
        let loader = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            loader_fn(move |_key| {
                calls.fetch_add(1, Ordering::SeqCst);
                while !gate.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(b"v1".to_vec())
            })
        };
        let group = Arc::new(Group::new("images", 1000, loader));

        let handles = spawn_gets(&group, "k1", CALLERS);
        park_waiters(&group, "k1", CALLERS - 1);
        gate.store(true, Ordering::SeqCst);

        for handle in handles {
            let value = handle.join().unwrap().unwrap();
            assert_eq!(value.to_string(), "v1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().coalesced(), (CALLERS - 1) as u64);
        assert_eq!(group.flight.in_flight(), 0);
    }

    #[test]
    fn test_group_concurrent_misses_fetch_peer_once() {
        const CALLERS: usize = 50;

        let calls = Arc::new(AtomicUsize::new(0));
        let group = Arc::new(Group::new("images", 1000, counting_loader(Arc::clone(&calls))));
        let peer = Arc::new(GatedPeer::new(Ok("remote")));
        group.register_peers(Arc::new(AlwaysPick(peer.clone())));

        let handles = spawn_gets(&group, "k1", CALLERS);
        park_waiters(&group, "k1", CALLERS - 1);
        peer.gate.store(true, Ordering::SeqCst);

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap().to_string(), "remote");
        }

        assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(group.stats().coalesced(), (CALLERS - 1) as u64);
        assert_eq!(group.cache_len(), 0);
    }

    #[test]
    fn test_group_concurrent_misses_share_loader_error() {
        const CALLERS: usize = 50;

        let calls = Arc::new(AtomicUsize::new(0));
        let loader = {
            let calls = Arc::clone(&calls);
            loader_fn(move |_key| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("loader down".into())
            })
        };
        let group = Arc::new(Group::new("images", 1000, loader));
        let peer = Arc::new(GatedPeer::new(Err("peer unreachable")));
        group.register_peers(Arc::new(AlwaysPick(peer.clone())));

        let handles = spawn_gets(&group, "k1", CALLERS);
        park_waiters(&group, "k1", CALLERS - 1);
        peer.gate.store(true, Ordering::SeqCst);

        let errors: Vec<LoadError> = handles
            .into_iter()
            .map(|handle| match handle.join().unwrap() {
                Err(Error::Load(e)) => e,
                other => panic!("expected loader error, got {:?}", other),
            })
            .collect();

        let first = &errors[0];
        assert_eq!(first.to_string(), "loader down");
        assert!(errors.iter().all(|e| e.same_failure(first)));
        assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().peer_errors(), 1);
    }

    #[test]
    fn test_group_loader_error_is_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = {
            let calls = Arc::clone(&calls);
            loader_fn(move |key| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("{} not exist", key).into())
            })
        };
        let group = Group::new("scores", 1000, loader);

        let err = group.get("Tom").unwrap_err();
        assert_eq!(err.to_string(), "Tom not exist");
        assert!(matches!(err, Error::Load(_)));

        group.get("Tom").unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(group.cache_len(), 0);
        assert_eq!(group.stats().local_load_errors(), 2);
    }

    #[test]
    fn test_group_peer_value_not_stored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Group::new("images", 1000, counting_loader(Arc::clone(&calls)));
        group.register_peers(Arc::new(AlwaysPick(Arc::new(StaticPeer("remote")))));

        let value = group.get("k1").unwrap();

        assert_eq!(value.to_string(), "remote");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(group.cache_len(), 0);
        assert_eq!(group.stats().peer_loads(), 1);

        // Not stored, so the next lookup goes back to the peer.
        group.get("k1").unwrap();
        assert_eq!(group.stats().peer_loads(), 2);
        assert_eq!(group.stats().hits(), 0);
    }

    #[test]
    fn test_group_peer_failure_falls_back() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Group::new("images", 1000, counting_loader(Arc::clone(&calls)));
        let peer = Arc::new(FailingPeer { calls: AtomicUsize::new(0) });
        group.register_peers(Arc::new(AlwaysPick(peer.clone())));

        let value = group.get("k1").unwrap();

        assert_eq!(value.to_string(), "v-k1");
        assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.cache_len(), 1);
        assert_eq!(group.stats().peer_errors(), 1);

        // The locally loaded value is now a hit; the peer is not asked again.
        group.get("k1").unwrap();
        assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().hits(), 1);
    }

    #[test]
    fn test_group_peer_and_loader_fail() {
        let loader = loader_fn(|_key| Err("loader down".into()));
        let group = Group::new("images", 1000, loader);
        group.register_peers(Arc::new(AlwaysPick(Arc::new(FailingPeer {
            calls: AtomicUsize::new(0),
        }))));

        let err = group.get("k1").unwrap_err();

        assert_eq!(err.to_string(), "loader down");
    }

    #[test]
    fn test_group_no_peer_selected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let group = Group::new("images", 1000, counting_loader(Arc::clone(&calls)));
        group.register_peers(Arc::new(NeverPick));

        group.get("k1").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.cache_len(), 1);
        assert_eq!(group.stats().peer_loads(), 0);
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn test_group_register_peers_twice() {
        let group = Group::new("images", 1000, counting_loader(Arc::new(AtomicUsize::new(0))));

        group.register_peers(Arc::new(NeverPick));
        group.register_peers(Arc::new(NeverPick));
    }

    #[test]
    fn test_group_evicts_under_pressure() {
        let calls = Arc::new(AtomicUsize::new(0));
        // "kN" + "v-kN" + overhead fits twice, not three times.
        let entry = 2 + 4 + meshstore::ENTRY_OVERHEAD;
        let group = Group::new("images", 2 * entry, counting_loader(Arc::clone(&calls)));

        group.get("k1").unwrap();
        group.get("k2").unwrap();
        group.get("k3").unwrap();

        assert_eq!(group.cache_len(), 2);
        assert!(group.cache_bytes() <= group.max_cache_bytes());
        assert_eq!(group.stats().evictions(), 1);

        group.get("k1").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_group_from_config() {
        let config = GroupConfig::new("scores").cache_bytes(4096);
        let group = Group::from_config(&config, counting_loader(Arc::new(AtomicUsize::new(0))));

        assert_eq!(group.name(), "scores");
        assert_eq!(group.max_cache_bytes(), 4096);
    }
}
