use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Small in-memory cache whose entries expire a fixed time after being set.
///
/// Expired entries are dropped lazily when read, or in bulk by [`TtlCache::purge_expired`].
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(Instant::now()) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value`, expiring after `ttl` or the cache default
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let entry = CacheEntry { value, stored_at: Instant::now(), ttl: ttl.unwrap_or(self.default_ttl) };
        self.entries.lock().insert(key, entry);
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.lock().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(30));
        cache.set("status".to_string(), 7, Some(Duration::from_secs(1)));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(cache.get("status"), Some(7));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("status"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_and_purge() {
        let cache: TtlCache<&'static str, &'static str> = TtlCache::new(Duration::from_secs(30));
        cache.set("short", "a", Some(Duration::from_secs(5)));
        cache.set("long", "b", None);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some("b"));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(cache.get("long"), None);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(30));
        cache.set("a".into(), 1, None);
        cache.set("b".into(), 2, None);

        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.get("a"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite_resets_value() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(30));
        cache.set("a".into(), 1, None);
        cache.set("a".into(), 2, None);
        assert_eq!(cache.get("a"), Some(2));
    }
}
