//! Per-user read state for notifications.
//!
//! Each user gets one ordered id list under `read_notifications_<email>`,
//! oldest mark first. Membership is what matters to callers; the order only
//! decides which stale ids go first once the list passes the configured cap.
//!
//! Marking never prunes. Pruning happens in [`ReadStateStore::compact`],
//! which is handed the ids the latest load produced and only drops ids
//! outside that set, so a notification the backend still returns keeps its
//! read flag no matter how many others were marked.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::errors::AppError;
use crate::store::prefs::Preferences;

pub const KEY_PREFIX: &str = "read_notifications_";

pub fn key_for(email: &str) -> String {
    format!("{}{}", KEY_PREFIX, email.trim().to_lowercase())
}

/// Injected wherever notifications are loaded or acknowledged.
pub trait ReadStateStore: Send + Sync {
    fn read_ids(&self, email: &str) -> Result<HashSet<String>, AppError>;

    /// Mark every id in `ids` read. Already-read ids are left as they are.
    fn mark_all_read(&self, email: &str, ids: &[String]) -> Result<(), AppError>;

    fn mark_read(&self, email: &str, id: &str) -> Result<(), AppError> {
        self.mark_all_read(email, &[id.to_string()])
    }

    fn is_read(&self, email: &str, id: &str) -> Result<bool, AppError> {
        Ok(self.read_ids(email)?.contains(id))
    }

    /// Bring the user's list back under the cap by dropping the oldest ids
    /// not in `live`. Returns how many were dropped.
    fn compact(&self, email: &str, live: &HashSet<String>) -> Result<usize, AppError>;
}

/// Append unseen ids to `list`. Returns whether `list` changed.
pub(crate) fn insert_new(list: &mut Vec<String>, ids: &[String]) -> bool {
    let mut seen: HashSet<String> = list.iter().cloned().collect();
    let before = list.len();
    for id in ids {
        if seen.insert(id.clone()) {
            list.push(id.clone());
        }
    }
    list.len() != before
}

/// Drop the oldest ids outside `live` until `list` fits in `cap` (0 = no
/// cap). Live ids are never dropped, so the list may stay over the cap.
pub(crate) fn prune_stale(list: &mut Vec<String>, cap: usize, live: &HashSet<String>) -> usize {
    if cap == 0 || list.len() <= cap {
        return 0;
    }
    let mut excess = list.len() - cap;
    let before = list.len();
    list.retain(|id| {
        if excess > 0 && !live.contains(id) {
            excess -= 1;
            false
        } else {
            true
        }
    });
    let pruned = before - list.len();
    if pruned > 0 {
        tracing::debug!(pruned, cap, kept = list.len(), "read state over cap, pruned stale ids");
    }
    pruned
}

/// Read state stored in the shared [`Preferences`] document.
pub struct PrefsReadStateStore {
    prefs: Arc<Preferences>,
    cap: usize,
}

impl PrefsReadStateStore {
    pub fn new(prefs: Arc<Preferences>, cap: usize) -> Self {
        Self { prefs, cap }
    }
}

impl ReadStateStore for PrefsReadStateStore {
    fn read_ids(&self, email: &str) -> Result<HashSet<String>, AppError> {
        let ids: Option<Vec<String>> = self.prefs.get(&key_for(email))?;
        Ok(ids.unwrap_or_default().into_iter().collect())
    }

    fn mark_all_read(&self, email: &str, ids: &[String]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.edit(email, |list| insert_new(list, ids))?;
        tracing::debug!(user = %email, count = ids.len(), "marked notifications read");
        Ok(())
    }

    fn compact(&self, email: &str, live: &HashSet<String>) -> Result<usize, AppError> {
        if self.cap == 0 {
            return Ok(0);
        }
        let mut pruned = 0;
        self.edit(email, |list| {
            pruned = prune_stale(list, self.cap, live);
            pruned > 0
        })?;
        Ok(pruned)
    }
}

impl PrefsReadStateStore {
    /// Load the user's list, let `f` change it, and write it back if `f`
    /// reports a change.
    fn edit<F>(&self, email: &str, f: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Vec<String>) -> bool,
    {
        let key = key_for(email);
        let mut decode_err = None;

        self.prefs.update(|doc| {
            let mut list: Vec<String> = match doc.get(&key) {
                Some(v) => match serde_json::from_value(v.clone()) {
                    Ok(list) => list,
                    Err(e) => {
                        decode_err = Some(e);
                        return false;
                    }
                },
                None => Vec::new(),
            };
            if !f(&mut list) {
                return false;
            }
            doc.insert(key.clone(), serde_json::Value::from(list));
            true
        })?;

        match decode_err {
            Some(e) => Err(AppError::Store(format!("read state for {} is malformed: {}", key, e))),
            None => Ok(()),
        }
    }
}

/// Process-local read state; nothing survives a restart.
#[derive(Default)]
pub struct MemoryReadStateStore {
    lists: Mutex<HashMap<String, Vec<String>>>,
    cap: usize,
}

impl MemoryReadStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            lists: Mutex::default(),
            cap,
        }
    }
}

impl ReadStateStore for MemoryReadStateStore {
    fn read_ids(&self, email: &str) -> Result<HashSet<String>, AppError> {
        let lists = self
            .lists
            .lock()
            .map_err(|_| AppError::Store("read state lock poisoned".into()))?;
        Ok(lists
            .get(&key_for(email))
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn mark_all_read(&self, email: &str, ids: &[String]) -> Result<(), AppError> {
        let mut lists = self
            .lists
            .lock()
            .map_err(|_| AppError::Store("read state lock poisoned".into()))?;
        let list = lists.entry(key_for(email)).or_default();
        insert_new(list, ids);
        Ok(())
    }

    fn compact(&self, email: &str, live: &HashSet<String>) -> Result<usize, AppError> {
        let mut lists = self
            .lists
            .lock()
            .map_err(|_| AppError::Store("read state lock poisoned".into()))?;
        Ok(lists
            .get_mut(&key_for(email))
            .map(|list| prune_stale(list, self.cap, live))
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn live(raw: &[&str]) -> HashSet<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_insert_new_skips_duplicates() {
        let mut list = ids(&["a"]);
        assert!(insert_new(&mut list, &ids(&["b", "a", "b"])));
        assert_eq!(list, ids(&["a", "b"]));
        assert!(!insert_new(&mut list, &ids(&["a"])));
    }

    #[test]
    fn test_prune_stale_drops_oldest_non_live_first() {
        let mut list = ids(&["a", "b", "c", "d", "e"]);
        assert_eq!(prune_stale(&mut list, 3, &live(&["a", "e"])), 2);
        assert_eq!(list, ids(&["a", "d", "e"]));
    }

    #[test]
    fn test_prune_stale_never_drops_live_ids() {
        let mut list = ids(&["a", "b", "c", "d"]);
        assert_eq!(prune_stale(&mut list, 2, &live(&["a", "b", "c"])), 1);
        assert_eq!(list, ids(&["a", "b", "c"]));

        let mut under = ids(&["a", "b"]);
        assert_eq!(prune_stale(&mut under, 0, &HashSet::new()), 0);
        assert_eq!(prune_stale(&mut under, 2, &HashSet::new()), 0);
        assert_eq!(under.len(), 2);
    }

    #[test]
    fn test_key_is_namespaced_and_case_folded() {
        assert_eq!(key_for(" Alice@Campus.edu "), "read_notifications_alice@campus.edu");
    }

    #[test]
    fn test_memory_store_mark_read_is_idempotent() {
        let store = MemoryReadStateStore::new();
        store.mark_read("a@x.edu", "update_1").unwrap();
        let once = store.read_ids("a@x.edu").unwrap();
        store.mark_read("a@x.edu", "update_1").unwrap();
        assert_eq!(store.read_ids("a@x.edu").unwrap(), once);
        assert_eq!(once.len(), 1);
    }

    #[test]
    fn test_prefs_store_is_scoped_per_user() {
        let store = PrefsReadStateStore::new(Arc::new(Preferences::in_memory()), 0);
        store.mark_read("a@x.edu", "update_9").unwrap();
        assert!(store.is_read("a@x.edu", "update_9").unwrap());
        assert!(!store.is_read("b@x.edu", "update_9").unwrap());
    }

    #[test]
    fn test_prefs_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = PrefsReadStateStore::new(Arc::new(Preferences::open(&path)), 0);
        store
            .mark_all_read("a@x.edu", &ids(&["update_1", "update_2"]))
            .unwrap();
        drop(store);

        let reopened = PrefsReadStateStore::new(Arc::new(Preferences::open(&path)), 0);
        let read = reopened.read_ids("a@x.edu").unwrap();
        assert!(read.contains("update_1") && read.contains("update_2"));
    }

    #[test]
    fn test_marking_past_cap_keeps_every_mark() {
        let store = PrefsReadStateStore::new(Arc::new(Preferences::in_memory()), 2);
        store
            .mark_all_read("a@x.edu", &ids(&["update_1", "update_2", "update_3"]))
            .unwrap();
        store.mark_read("a@x.edu", "update_4").unwrap();

        let read = store.read_ids("a@x.edu").unwrap();
        assert_eq!(read, live(&["update_1", "update_2", "update_3", "update_4"]));
    }

    #[test]
    fn test_prefs_compact_only_drops_ids_no_longer_listed() {
        let store = PrefsReadStateStore::new(Arc::new(Preferences::in_memory()), 2);
        store
            .mark_all_read("a@x.edu", &ids(&["update_1", "update_2", "update_3", "update_4"]))
            .unwrap();

        let pruned = store
            .compact("a@x.edu", &live(&["update_1", "update_4"]))
            .unwrap();
        assert_eq!(pruned, 2);
        assert_eq!(store.read_ids("a@x.edu").unwrap(), live(&["update_1", "update_4"]));
    }

    #[test]
    fn test_memory_compact_respects_cap() {
        let store = MemoryReadStateStore::with_cap(1);
        store.mark_all_read("a@x.edu", &ids(&["update_1", "update_2"])).unwrap();
        assert_eq!(store.compact("a@x.edu", &live(&["update_2"])).unwrap(), 1);
        assert_eq!(store.read_ids("a@x.edu").unwrap(), live(&["update_2"]));
        assert_eq!(store.compact("b@x.edu", &HashSet::new()).unwrap(), 0);
    }
}
