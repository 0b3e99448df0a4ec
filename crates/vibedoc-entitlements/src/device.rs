//! Device-Scoped Counter Store
//!
//! Persistent key/value counters scoped to a single browser/device.
//! Counters are monotonically capped: increments saturate at the tier
//! limit and never reset. Clearing device storage is the only way a
//! counter disappears.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::config::EntitlementLimits;

const DEVICE_ID_KEY: &str = "vibedoc_device_id";
const ANON_USAGE_KEY: &str = "vibedoc_anon_usage";

/// Device-local string key/value persistence.
///
/// The logical contract of browser local storage: opaque string keys and
/// values, surviving reloads but not a storage reset.
pub trait DeviceStorage: Send + Sync {
    /// Read a key, `None` when absent
    fn get(&self, key: &str) -> Option<String>;
    /// Write a key
    fn set(&self, key: &str, value: &str);
}

/// In-memory device storage
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }
}

/// Device-scoped usage counters with capped increments
pub struct CounterStore {
    storage: Arc<dyn DeviceStorage>,
    limits: EntitlementLimits,
}

impl CounterStore {
    /// Create a counter store over the given device storage
    pub fn new(storage: Arc<dyn DeviceStorage>, limits: EntitlementLimits) -> Self {
        Self { storage, limits }
    }

    /// Existing device id, or mint and persist a new one.
    ///
    /// Stable for the lifetime of the storage; never regenerated once set.
    pub fn device_id(&self) -> String {
        if let Some(id) = self.storage.get(DEVICE_ID_KEY) {
            if !id.is_empty() {
                return id;
            }
        }
        let id = Uuid::new_v4().to_string();
        self.storage.set(DEVICE_ID_KEY, &id);
        id
    }

    /// Total anonymous generations recorded on this device
    pub fn anonymous_usage(&self) -> u32 {
        self.read_counter(ANON_USAGE_KEY)
    }

    /// Record one anonymous use; saturates at the anonymous cap.
    ///
    /// Storage may hold any parsable value (it is client-writable), so
    /// the increment itself must not overflow before the clamp.
    pub fn record_anonymous_use(&self) -> u32 {
        let next = self
            .anonymous_usage()
            .saturating_add(1)
            .min(self.limits.anon_total_limit);
        self.storage.set(ANON_USAGE_KEY, &next.to_string());
        next
    }

    /// Usage recorded for an (email, device) pair
    pub fn email_device_usage(&self, email: &str) -> u32 {
        self.read_counter(&self.email_device_key(email))
    }

    /// Persist an (email, device) counter.
    ///
    /// The caller clamps to the free-tier cap before writing; the store
    /// does not re-clamp.
    pub fn set_email_device_usage(&self, email: &str, value: u32) {
        self.storage
            .set(&self.email_device_key(email), &value.to_string());
    }

    /// Anonymous usage already absorbed into an (email, device) counter
    /// by a past merge
    pub fn absorbed_anonymous(&self, email: &str) -> u32 {
        self.read_counter(&self.absorbed_key(email))
    }

    /// Record how much anonymous usage the (email, device) counter has
    /// absorbed, so repeated merges only apply the delta
    pub fn set_absorbed_anonymous(&self, email: &str, value: u32) {
        self.storage.set(&self.absorbed_key(email), &value.to_string());
    }

    fn email_device_key(&self, email: &str) -> String {
        format!(
            "vibedoc_usage_{}_{}",
            email.trim().to_lowercase(),
            self.device_id()
        )
    }

    fn absorbed_key(&self, email: &str) -> String {
        format!(
            "vibedoc_merged_anon_{}_{}",
            email.trim().to_lowercase(),
            self.device_id()
        )
    }

    // Non-numeric storage content counts as zero, never as an error.
    fn read_counter(&self, key: &str) -> u32 {
        self.storage
            .get(key)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CounterStore {
        CounterStore::new(Arc::new(MemoryStorage::new()), EntitlementLimits::default())
    }

    #[test]
    fn test_device_id_stable() {
        let store = store();

        let first = store.device_id();
        let second = store.device_id();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_anonymous_increment_saturates() {
        let store = store();

        for _ in 0..10 {
            store.record_anonymous_use();
        }

        assert_eq!(store.anonymous_usage(), 3);
    }

    #[test]
    fn test_oversized_stored_counter_clamps_without_overflow() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(ANON_USAGE_KEY, &u32::MAX.to_string());
        let store = CounterStore::new(storage, EntitlementLimits::default());

        assert_eq!(store.record_anonymous_use(), 3);
        assert_eq!(store.anonymous_usage(), 3);
    }

    #[test]
    fn test_unparsable_counter_reads_as_zero() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(ANON_USAGE_KEY, "not-a-number");
        let store = CounterStore::new(storage, EntitlementLimits::default());

        assert_eq!(store.anonymous_usage(), 0);
    }

    #[test]
    fn test_email_counters_keyed_per_email() {
        let store = store();

        store.set_email_device_usage("a@x.com", 2);
        store.set_email_device_usage("b@x.com", 4);

        assert_eq!(store.email_device_usage("a@x.com"), 2);
        assert_eq!(store.email_device_usage("b@x.com"), 4);
        assert_eq!(store.email_device_usage("c@x.com"), 0);
    }

    #[test]
    fn test_email_key_normalizes_case() {
        let store = store();

        store.set_email_device_usage("User@X.com", 3);

        assert_eq!(store.email_device_usage("user@x.com"), 3);
    }
}
