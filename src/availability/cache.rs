//! Slot-expansion cache.
//!
//! Entries are keyed by `(therapist, start, end)` and expire after a TTL.
//! Any availability write for a therapist drops every entry of that
//! therapist, whatever the range.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::models::AvailableSlot;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotCacheKey {
    pub therapist_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SlotCacheKey {
    pub fn new(therapist_id: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            therapist_id: therapist_id.into(),
            start,
            end,
        }
    }
}

/// TTL key-value store for expanded slots.
pub trait SlotCache: Send + Sync {
    fn get(&self, key: &SlotCacheKey) -> Option<Vec<AvailableSlot>>;

    fn put(&self, key: SlotCacheKey, slots: Vec<AvailableSlot>, ttl: Duration);

    /// Drop every entry for the therapist. Returns how many were removed.
    fn invalidate_therapist(&self, therapist_id: &str) -> usize;
}

struct CachedExpansion {
    slots: Vec<AvailableSlot>,
    expires_at: Instant,
}

/// Process-local `SlotCache`.
pub struct InMemorySlotCache {
    entries: Mutex<HashMap<SlotCacheKey, CachedExpansion>>,
}

impl InMemorySlotCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySlotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotCache for InMemorySlotCache {
    fn get(&self, key: &SlotCacheKey) -> Option<Vec<AvailableSlot>> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.slots.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: SlotCacheKey, slots: Vec<AvailableSlot>, ttl: Duration) {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!("Slot cache lock poisoned, skipping insert");
            return;
        };
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key,
            CachedExpansion {
                slots,
                expires_at: now + ttl,
            },
        );
    }

    fn invalidate_therapist(&self, therapist_id: &str) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|key, _| key.therapist_id != therapist_id);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionType;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample() -> Vec<AvailableSlot> {
        vec![AvailableSlot {
            date: date(1),
            start_time: "09:00".into(),
            end_time: "17:00".into(),
            session_type: SessionType::Online,
        }]
    }

    #[test]
    fn hit_returns_stored_slots() {
        let cache = InMemorySlotCache::new();
        let key = SlotCacheKey::new("t-1", date(1), date(7));
        cache.put(key.clone(), sample(), Duration::from_secs(3600));
        assert_eq!(cache.get(&key), Some(sample()));
        assert_eq!(cache.get(&SlotCacheKey::new("t-1", date(1), date(8))), None);
    }

    #[test]
    fn expired_entries_miss() {
        let cache = InMemorySlotCache::new();
        let key = SlotCacheKey::new("t-1", date(1), date(7));
        cache.put(key.clone(), sample(), Duration::ZERO);
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidation_is_per_therapist_across_ranges() {
        let cache = InMemorySlotCache::new();
        let ttl = Duration::from_secs(3600);
        cache.put(SlotCacheKey::new("t-1", date(1), date(7)), sample(), ttl);
        cache.put(SlotCacheKey::new("t-1", date(8), date(14)), sample(), ttl);
        cache.put(SlotCacheKey::new("t-2", date(1), date(7)), sample(), ttl);

        assert_eq!(cache.invalidate_therapist("t-1"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&SlotCacheKey::new("t-2", date(1), date(7))).is_some());
    }
}
