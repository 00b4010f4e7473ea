// ABOUTME: Time-bounded in-memory key-value store used by the authorization server
// ABOUTME: Supports lazy expiry at lookup and eager sweeping of expired entries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use dashmap::DashMap;
use tokio::time::Instant;

/// Value with an absolute expiry deadline
pub trait Expiring {
    /// Instant after which the value is dead
    fn expires_at(&self) -> Instant;

    /// True once `now` has reached the deadline
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// Concurrent map of opaque keys to expiring values.
///
/// Each authorization server owns its own stores, so independent instances
/// never share state.
#[derive(Debug)]
pub struct ExpiringStore<T> {
    name: &'static str,
    entries: DashMap<String, T>,
}

impl<T: Expiring> ExpiringStore<T> {
    /// Create an empty store; `name` only appears in logs
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: DashMap::new(),
        }
    }

    /// Insert or replace a value
    pub fn insert(&self, key: String, value: T) {
        self.entries.insert(key, value);
    }

    /// Remove and return a live value. An expired value is removed too but
    /// reported as absent.
    pub fn take(&self, key: &str, now: Instant) -> Option<T> {
        let (_, value) = self.entries.remove(key)?;
        if value.is_expired(now) {
            tracing::debug!(store = self.name, "Discarded expired entry on lookup");
            return None;
        }
        Some(value)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, value| !value.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(store = self.name, removed, "Purged expired entries");
        }
        removed
    }

    /// Apply `update` to every entry matching `predicate`, returning the count
    pub fn update_matching<P, U>(&self, predicate: P, update: U) -> usize
    where
        P: Fn(&T) -> bool,
        U: Fn(&mut T),
    {
        let mut updated = 0;
        for mut entry in self.entries.iter_mut() {
            if predicate(entry.value()) {
                update(entry.value_mut());
                updated += 1;
            }
        }
        updated
    }

    /// True when `key` has an entry, live or not yet purged
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries, including expired ones not yet purged
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Expiring + Clone> ExpiringStore<T> {
    /// Clone a live value without removing it
    pub fn get(&self, key: &str, now: Instant) -> Option<T> {
        let value = self.entries.get(key)?.value().clone();
        if value.is_expired(now) {
            self.entries.remove(key);
            return None;
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[derive(Debug, Clone)]
    struct Entry(Instant);

    impl Expiring for Entry {
        fn expires_at(&self) -> Instant {
            self.0
        }
    }

    #[test]
    fn test_take_is_single_use() {
        let store = ExpiringStore::new("test");
        let now = Instant::now();
        store.insert("k".into(), Entry(now + Duration::from_secs(60)));

        assert!(store.take("k", now).is_some());
        assert!(store.take("k", now).is_none());
    }

    #[test]
    fn test_expired_entries_are_absent_and_removed() {
        let store = ExpiringStore::new("test");
        let now = Instant::now();
        store.insert("k".into(), Entry(now + Duration::from_secs(10)));

        let later = now + Duration::from_secs(10);
        assert!(store.get("k", later).is_none());
        assert!(!store.contains("k"));
    }

    #[test]
    fn test_purge_only_removes_expired() {
        let store = ExpiringStore::new("test");
        let now = Instant::now();
        store.insert("old".into(), Entry(now + Duration::from_secs(1)));
        store.insert("new".into(), Entry(now + Duration::from_secs(100)));

        assert_eq!(store.purge_expired(now + Duration::from_secs(5)), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("new", now).is_some());
        assert_eq!(store.purge_expired(now + Duration::from_secs(5)), 0);
    }
}
