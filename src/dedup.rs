//! Bounded-TTL cache of already-seen event identifiers.
//!
//! Not a correctness guarantee against reprocessing beyond the TTL: an event
//! replayed after expiry is treated as new, which downstream matching
//! tolerates because claims are idempotent on target status.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_CADENCE: Duration = Duration::from_secs(60);

pub struct DedupCache {
    ttl: Duration,
    sweep_cadence: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    entries: HashMap<String, Instant>,
    last_sweep: Instant,
}

impl DedupCache {
    pub fn new(ttl: Duration, sweep_cadence: Duration) -> Self {
        Self {
            ttl,
            sweep_cadence,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_SWEEP_CADENCE)
    }

    /// Atomically record `id` as seen. Returns `false` if it was already
    /// present within the TTL window, in which case the caller drops the
    /// event. Sweeping is amortized onto this call at a fixed cadence rather
    /// than per event.
    pub fn insert(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();
        if now.duration_since(guard.last_sweep) >= self.sweep_cadence {
            self.sweep_locked(&mut guard, now);
        }
        match guard.entries.get(id) {
            Some(&stamp) if now.duration_since(stamp) < self.ttl => false,
            _ => {
                guard.entries.insert(id.to_owned(), now);
                true
            }
        }
    }

    pub fn seen(&self, id: &str) -> bool {
        let now = Instant::now();
        let guard = self.inner.lock().unwrap();
        guard
            .entries
            .get(id)
            .is_some_and(|&stamp| now.duration_since(stamp) < self.ttl)
    }

    pub fn mark(&self, id: &str) {
        let mut guard = self.inner.lock().unwrap();
        guard.entries.insert(id.to_owned(), Instant::now());
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry older than the TTL. Exposed for tests; production
    /// callers rely on the amortized trigger in [`DedupCache::insert`].
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();
        self.sweep_locked(&mut guard, now);
    }

    fn sweep_locked(&self, inner: &mut Inner, now: Instant) {
        let ttl = self.ttl;
        inner
            .entries
            .retain(|_, stamp| now.duration_since(*stamp) < ttl);
        inner.last_sweep = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_first_wins() {
        let cache = DedupCache::with_defaults();
        assert!(cache.insert("sig-1"));
        assert!(!cache.insert("sig-1"));
        assert!(cache.insert("sig-2"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn seen_and_mark() {
        let cache = DedupCache::with_defaults();
        assert!(!cache.seen("sig"));
        cache.mark("sig");
        assert!(cache.seen("sig"));
    }

    #[test]
    fn expired_entry_is_treated_as_new() {
        let cache = DedupCache::new(Duration::from_millis(5), Duration::from_secs(60));
        assert!(cache.insert("sig"));
        std::thread::sleep(Duration::from_millis(10));
        assert!(!cache.seen("sig"));
        assert!(cache.insert("sig"));
    }

    #[test]
    fn sweep_bounds_memory() {
        let cache = DedupCache::new(Duration::from_millis(5), Duration::from_secs(60));
        for i in 0..100 {
            cache.mark(&format!("sig-{i}"));
        }
        std::thread::sleep(Duration::from_millis(10));
        cache.sweep();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_insert_admits_exactly_one() {
        use std::sync::Arc;

        let cache = Arc::new(DedupCache::with_defaults());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.insert("same-sig"))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|&admitted| admitted)
            .count();
        assert_eq!(admitted, 1);
    }
}
