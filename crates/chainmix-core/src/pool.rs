//! Per-draw entropy accumulation with a content commitment.
//!
//! The store is an explicit, cloneable handle owned by the orchestrator —
//! there is no process-wide global. Concurrency discipline:
//!
//! 1. The outer map lock is held only long enough to fetch or insert the
//!    per-draw handle; distinct draw ids never block each other.
//! 2. A per-draw mutex serializes appends and gives readers a consistent
//!    snapshot — the commitment root is always a pure function of the full
//!    ordered packet list at query time, never incremental state.
//!
//! Pools live only for the duration of a pipeline run, but nothing evicts
//! them implicitly; callers with attacker-controlled draw ids must run
//! [`EntropyStore::evict_idle`] on a schedule.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::hashing::commitment_root;

/// Cloneable handle to the process's per-draw entropy pools.
#[derive(Clone, Default)]
pub struct EntropyStore {
    pools: Arc<Mutex<HashMap<String, Arc<Mutex<DrawPool>>>>>,
}

struct DrawPool {
    packets: Vec<Vec<u8>>,
    total_bytes: usize,
    touched: Instant,
}

impl DrawPool {
    fn new() -> Self {
        Self {
            packets: Vec::new(),
            total_bytes: 0,
            touched: Instant::now(),
        }
    }
}

/// Consistent view of one draw's pool — taken under a single lock, so the
/// byte total, packet count, and root always describe the same sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub total_bytes: usize,
    pub packets: usize,
    pub root: [u8; 32],
}

impl PoolSnapshot {
    /// Hex commitment root, or `None` when no bytes were collected —
    /// an empty pool's root is defined but is not entropy evidence.
    pub fn root_hex_if_nonempty(&self) -> Option<String> {
        (self.total_bytes > 0).then(|| hex::encode(self.root))
    }

    pub fn root_hex(&self) -> String {
        hex::encode(self.root)
    }
}

impl EntropyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, draw_id: &str) -> Arc<Mutex<DrawPool>> {
        let mut pools = self.pools.lock().unwrap();
        pools
            .entry(draw_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(DrawPool::new())))
            .clone()
    }

    fn peek(&self, draw_id: &str) -> Option<Arc<Mutex<DrawPool>>> {
        self.pools.lock().unwrap().get(draw_id).cloned()
    }

    /// Append one opaque entropy packet. Creates the pool on first use.
    pub fn add(&self, draw_id: &str, packet: Vec<u8>) {
        let handle = self.handle(draw_id);
        let mut pool = handle.lock().unwrap();
        pool.total_bytes += packet.len();
        pool.packets.push(packet);
        pool.touched = Instant::now();
    }

    pub fn total_bytes(&self, draw_id: &str) -> usize {
        self.peek(draw_id)
            .map(|h| h.lock().unwrap().total_bytes)
            .unwrap_or(0)
    }

    pub fn packet_count(&self, draw_id: &str) -> usize {
        self.peek(draw_id)
            .map(|h| h.lock().unwrap().packets.len())
            .unwrap_or(0)
    }

    /// Byte total, packet count, and commitment root under one lock.
    pub fn snapshot(&self, draw_id: &str) -> PoolSnapshot {
        match self.peek(draw_id) {
            Some(handle) => {
                let pool = handle.lock().unwrap();
                PoolSnapshot {
                    total_bytes: pool.total_bytes,
                    packets: pool.packets.len(),
                    root: commitment_root(pool.packets.iter().map(|p| p.as_slice())),
                }
            }
            None => PoolSnapshot {
                total_bytes: 0,
                packets: 0,
                root: commitment_root(std::iter::empty::<&[u8]>()),
            },
        }
    }

    /// Commitment root over the full ordered packet list, recomputed on
    /// every call.
    pub fn commitment_root(&self, draw_id: &str) -> [u8; 32] {
        self.snapshot(draw_id).root
    }

    /// Root bytes, but only when the pool actually holds entropy.
    pub fn root_if_nonempty(&self, draw_id: &str) -> Option<[u8; 32]> {
        let snap = self.snapshot(draw_id);
        (snap.total_bytes > 0).then_some(snap.root)
    }

    /// Drop the pool, used before a new draw reuses an id.
    pub fn clear(&self, draw_id: &str) {
        self.pools.lock().unwrap().remove(draw_id);
    }

    /// Remove pools not touched within `max_age`. Returns how many were
    /// evicted. The orchestrator runs this on its schedule.
    pub fn evict_idle(&self, max_age: Duration) -> usize {
        let mut pools = self.pools.lock().unwrap();
        let before = pools.len();
        pools.retain(|_, handle| handle.lock().unwrap().touched.elapsed() <= max_age);
        let evicted = before - pools.len();
        if evicted > 0 {
            log::debug!("evicted {evicted} idle entropy pool(s)");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_pool_counts() {
        let store = EntropyStore::new();
        assert_eq!(store.total_bytes("d"), 0);
        assert_eq!(store.packet_count("d"), 0);
        assert!(store.root_if_nonempty("d").is_none());
    }

    #[test]
    fn test_add_accumulates_in_order() {
        let store = EntropyStore::new();
        store.add("d", vec![1, 2, 3]);
        store.add("d", vec![4, 5]);
        assert_eq!(store.total_bytes("d"), 5);
        assert_eq!(store.packet_count("d"), 2);
    }

    #[test]
    fn test_root_is_pure_function_of_packet_list() {
        let a = EntropyStore::new();
        a.add("d", vec![1, 2, 3]);
        a.add("d", vec![4, 5]);

        // A second store fed the same ordered packets must agree.
        let b = EntropyStore::new();
        b.add("other-id", vec![1, 2, 3]);
        b.add("other-id", vec![4, 5]);
        assert_eq!(a.commitment_root("d"), b.commitment_root("other-id"));

        // Appending changes the root on the next query.
        let before = a.commitment_root("d");
        a.add("d", vec![6]);
        assert_ne!(before, a.commitment_root("d"));
    }

    #[test]
    fn test_empty_root_is_defined() {
        let store = EntropyStore::new();
        let snap = store.snapshot("never-seen");
        assert_eq!(snap.root, *blake3::hash(b"").as_bytes());
        assert!(snap.root_hex_if_nonempty().is_none());
    }

    #[test]
    fn test_clear_drops_pool() {
        let store = EntropyStore::new();
        store.add("d", vec![9; 16]);
        store.clear("d");
        assert_eq!(store.total_bytes("d"), 0);
    }

    #[test]
    fn test_snapshot_is_consistent() {
        let store = EntropyStore::new();
        store.add("d", vec![0; 10]);
        let snap = store.snapshot("d");
        assert_eq!(snap.total_bytes, 10);
        assert_eq!(snap.packets, 1);
        assert_eq!(snap.root, store.commitment_root("d"));
    }

    #[test]
    fn test_concurrent_appends_do_not_lose_packets() {
        let store = EntropyStore::new();
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.add("shared", vec![i as u8; 4]);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(store.packet_count("shared"), 800);
        assert_eq!(store.total_bytes("shared"), 3200);
    }

    #[test]
    fn test_distinct_draw_ids_are_independent() {
        let store = EntropyStore::new();
        store.add("a", vec![1]);
        store.add("b", vec![2, 3]);
        assert_eq!(store.total_bytes("a"), 1);
        assert_eq!(store.total_bytes("b"), 2);
        assert_ne!(store.commitment_root("a"), store.commitment_root("b"));
    }

    #[test]
    fn test_evict_idle() {
        let store = EntropyStore::new();
        store.add("old", vec![1]);
        assert_eq!(store.evict_idle(Duration::from_secs(3600)), 0);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(store.evict_idle(Duration::from_millis(1)), 1);
        assert_eq!(store.packet_count("old"), 0);
    }
}
