use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::store::TtlStore;
use crate::clock::Clock;
use crate::error::StoreError;

/// In-process [`TtlStore`]. Keys expire lazily against the injected clock.
///
/// The store can be switched offline, after which every call fails with
/// [`StoreError::Unavailable`], to exercise fail-open behavior.
pub struct MemoryTtlStore {
    clock: Arc<dyn Clock>,
    // key -> absolute expiry time
    entries: Mutex<HashMap<String, f64>>,
    online: AtomicBool,
}

impl MemoryTtlStore {
    /// Empty, online store expiring keys against `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Switch the store on or off line.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Remaining TTL of a live key, in seconds.
    pub fn ttl(&self, key: &str) -> Option<f64> {
        let now = self.clock.now();
        self.entries
            .lock()
            .get(key)
            .map(|expiry| expiry - now)
            .filter(|remaining| *remaining > 0.0)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.lock().values().filter(|&&e| e > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".into()))
        }
    }
}

impl TtlStore for MemoryTtlStore {
    fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check_online()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(&expiry) if expiry > now => Ok(false),
            _ => {
                entries.insert(key.to_string(), now + ttl.as_secs_f64());
                Ok(true)
            }
        }
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check_online()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(&expiry) if expiry > now => Ok(true),
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check_online()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(expiry) if *expiry > now => {
                *expiry = now + ttl.as_secs_f64();
                Ok(true)
            }
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.entries.lock().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check_online()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        entries.retain(|_, expiry| *expiry > now);
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store() -> (ManualClock, MemoryTtlStore) {
        let clock = ManualClock::new(0.0);
        let store = MemoryTtlStore::new(Arc::new(clock.clone()));
        (clock, store)
    }

    #[test]
    fn test_set_if_absent_and_expiry() {
        let (clock, store) = store();
        assert!(store.set_if_absent("k", Duration::from_secs(10)).unwrap());
        assert!(!store.set_if_absent("k", Duration::from_secs(10)).unwrap());
        clock.advance(9.0);
        assert!(store.exists("k").unwrap());
        clock.advance(1.0);
        assert!(!store.exists("k").unwrap());
        assert!(store.set_if_absent("k", Duration::from_secs(10)).unwrap());
    }

    #[test]
    fn test_expire_extends_live_keys_only() {
        let (clock, store) = store();
        assert!(!store.expire("k", Duration::from_secs(10)).unwrap());
        assert!(!store.exists("k").unwrap());

        store.set_if_absent("k", Duration::from_secs(10)).unwrap();
        clock.advance(8.0);
        assert!(store.expire("k", Duration::from_secs(10)).unwrap());
        assert_eq!(store.ttl("k"), Some(10.0));
        assert_eq!(store.len(), 1);

        clock.advance(10.0);
        assert!(!store.expire("k", Duration::from_secs(10)).unwrap());
    }

    #[test]
    fn test_scan_and_delete() {
        let (_clock, store) = store();
        store.set_if_absent("a:1", Duration::from_secs(5)).unwrap();
        store.set_if_absent("a:2", Duration::from_secs(5)).unwrap();
        store.set_if_absent("b:1", Duration::from_secs(5)).unwrap();
        assert_eq!(store.scan("a:").unwrap(), vec!["a:1", "a:2"]);
        store.delete("a:1").unwrap();
        assert_eq!(store.scan("a:").unwrap(), vec!["a:2"]);
    }

    #[test]
    fn test_offline_errors() {
        let (_clock, store) = store();
        store.set_online(false);
        assert!(matches!(store.exists("k"), Err(StoreError::Unavailable(_))));
        assert!(store.set_if_absent("k", Duration::from_secs(1)).is_err());
        store.set_online(true);
        assert!(!store.exists("k").unwrap());
    }
}
