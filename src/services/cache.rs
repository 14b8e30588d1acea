// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived read-through cache of each owner's todo list.
//!
//! Entries expire `ttl` after insertion and are dropped lazily on read (or by
//! [`TodoCache::purge_expired`]). Lists are stored behind an `Arc` and
//! replaced whole, so readers always see a complete snapshot.

use crate::models::Todo;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    todos: Arc<Vec<Todo>>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > ttl
    }
}

/// Per-owner todo list cache.
pub struct TodoCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl TodoCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached list for `oid`, or `None` if absent or expired.
    pub fn get(&self, oid: &str) -> Option<Arc<Vec<Todo>>> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(oid) {
            if !entry.is_expired(self.ttl, now) {
                tracing::debug!(oid, "Todo cache hit");
                return Some(entry.todos.clone());
            }
        }
        // The read guard is released here; remove only if still expired so a
        // concurrent fresh `set` is not lost.
        if self
            .entries
            .remove_if(oid, |_, entry| entry.is_expired(self.ttl, now))
            .is_some()
        {
            tracing::debug!(oid, "Todo cache entry expired");
        }
        None
    }

    pub fn set(&self, oid: &str, todos: Vec<Todo>) -> Arc<Vec<Todo>> {
        let todos = Arc::new(todos);
        tracing::debug!(oid, count = todos.len(), "Todo cache set");
        self.entries.insert(
            oid.to_string(),
            CacheEntry {
                todos: todos.clone(),
                inserted_at: Instant::now(),
            },
        );
        todos
    }

    pub fn invalidate(&self, oid: &str) {
        if self.entries.remove(oid).is_some() {
            tracing::debug!(oid, "Todo cache invalidated");
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("Todo cache cleared");
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(self.ttl, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(id: i64, name: &str) -> Todo {
        Todo {
            id,
            name: name.to_string(),
            due_date: None,
            notes: None,
            priority: None,
            completed: false,
            oid: Some("u1".to_string()),
            recommendations_json: None,
        }
    }

    #[test]
    fn test_set_then_get() {
        let cache = TodoCache::new(Duration::from_secs(60));
        let list = vec![todo(1, "a"), todo(2, "b")];

        cache.set("u1", list.clone());

        assert_eq!(*cache.get("u1").unwrap(), list);
        assert!(cache.get("u2").is_none());
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = TodoCache::new(Duration::from_millis(20));
        cache.set("u1", vec![todo(1, "a")]);

        std::thread::sleep(Duration::from_millis(40));

        assert!(cache.get("u1").is_none());
        // Lazy expiry removed the entry
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = TodoCache::new(Duration::from_secs(60));
        cache.set("u1", vec![todo(1, "a")]);
        cache.set("u2", vec![todo(2, "b")]);

        cache.invalidate("u1");
        assert!(cache.get("u1").is_none());
        assert!(cache.get("u2").is_some());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache = TodoCache::new(Duration::from_millis(20));
        cache.set("old", vec![]);
        std::thread::sleep(Duration::from_millis(40));
        cache.set("new", vec![]);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_set_replaces_snapshot() {
        let cache = TodoCache::new(Duration::from_secs(60));
        let first = cache.set("u1", vec![todo(1, "a")]);
        cache.set("u1", vec![todo(1, "a"), todo(2, "b")]);

        // Earlier readers keep their complete snapshot
        assert_eq!(first.len(), 1);
        assert_eq!(cache.get("u1").unwrap().len(), 2);
    }
}
