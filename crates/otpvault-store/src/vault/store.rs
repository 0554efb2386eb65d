//! Record storage behind the [`EntryStore`] trait.
//!
//! A record is an opaque encrypted blob plus the indexable columns the
//! repository needs back (`id`, `entry_type`, timestamps). The trait is
//! async so a SQL-backed implementation drops in without touching the
//! repository; [`MemoryEntryStore`] is the reference implementation and
//! the test double.

use crate::vault::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use otpvault_engine::otp::EntryType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::{watch, Mutex};

/// A persisted row. `content` is the encrypted envelope; `entry_type`
/// is stored alongside it so lookups can filter without decrypting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: i64,
    pub content: Vec<u8>,
    pub entry_type: EntryType,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Fields for a new row; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewEntryRecord {
    pub content: Vec<u8>,
    pub entry_type: EntryType,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Storage abstraction for encrypted entry records.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert a new record and return it with its assigned id.
    async fn insert(&self, record: NewEntryRecord) -> Result<EntryRecord, StoreError>;

    /// Replace the content of an existing record, bumping `modified_at`.
    async fn update(
        &self,
        id: i64,
        content: Vec<u8>,
        entry_type: EntryType,
        modified_at: DateTime<Utc>,
    ) -> Result<EntryRecord, StoreError>;

    /// All records in creation order.
    async fn load_all(&self) -> Result<Vec<EntryRecord>, StoreError>;

    /// Records of one entry type, in creation order.
    async fn load_by_type(&self, entry_type: EntryType) -> Result<Vec<EntryRecord>, StoreError>;

    /// Delete a record.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Change feed: the value is a generation counter that increments on
    /// every mutation. Observers re-read after each change.
    fn watch(&self) -> watch::Receiver<u64>;
}

/// In-memory [`EntryStore`].
///
/// Ids are assigned from 1 and never reused; `BTreeMap` iteration gives
/// creation order for free.
pub struct MemoryEntryStore {
    state: Mutex<MemoryState>,
    generation: watch::Sender<u64>,
}

struct MemoryState {
    records: BTreeMap<i64, EntryRecord>,
    next_id: i64,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            state: Mutex::new(MemoryState {
                records: BTreeMap::new(),
                next_id: 1,
            }),
            generation,
        }
    }

    fn notify(&self) {
        self.generation.send_modify(|g| *g += 1);
    }
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn insert(&self, record: NewEntryRecord) -> Result<EntryRecord, StoreError> {
        let stored = {
            let mut state = self.state.lock().await;
            let id = state.next_id;
            state.next_id += 1;
            let stored = EntryRecord {
                id,
                content: record.content,
                entry_type: record.entry_type,
                created_at: record.created_at,
                modified_at: record.modified_at,
            };
            state.records.insert(id, stored.clone());
            stored
        };
        log::debug!("inserted entry record id={}", stored.id);
        self.notify();
        Ok(stored)
    }

    async fn update(
        &self,
        id: i64,
        content: Vec<u8>,
        entry_type: EntryType,
        modified_at: DateTime<Utc>,
    ) -> Result<EntryRecord, StoreError> {
        let updated = {
            let mut state = self.state.lock().await;
            let record = state.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            record.content = content;
            record.entry_type = entry_type;
            record.modified_at = modified_at;
            record.clone()
        };
        self.notify();
        Ok(updated)
    }

    async fn load_all(&self) -> Result<Vec<EntryRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.records.values().cloned().collect())
    }

    async fn load_by_type(&self, entry_type: EntryType) -> Result<Vec<EntryRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .values()
            .filter(|r| r.entry_type == entry_type)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock().await;
            state.records.remove(&id).ok_or(StoreError::NotFound(id))?;
        }
        self.notify();
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(entry_type: EntryType) -> NewEntryRecord {
        let now = Utc::now();
        NewEntryRecord {
            content: vec![1, 2, 3],
            entry_type,
            created_at: now,
            modified_at: now,
        }
    }

    // ── Insert / load ────────────────────────────────────────────

    #[tokio::test]
    async fn ids_start_at_one_and_increment() {
        let store = MemoryEntryStore::new();
        let a = store.insert(record(EntryType::Totp)).await.unwrap();
        let b = store.insert(record(EntryType::Hotp)).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn load_all_in_creation_order() {
        let store = MemoryEntryStore::new();
        for ty in [EntryType::Totp, EntryType::Steam, EntryType::Hotp] {
            store.insert(record(ty)).await.unwrap();
        }
        let all = store.load_all().await.unwrap();
        let types: Vec<_> = all.iter().map(|r| r.entry_type).collect();
        assert_eq!(types, vec![EntryType::Totp, EntryType::Steam, EntryType::Hotp]);
    }

    #[tokio::test]
    async fn load_by_type_filters() {
        let store = MemoryEntryStore::new();
        store.insert(record(EntryType::Totp)).await.unwrap();
        store.insert(record(EntryType::Steam)).await.unwrap();
        store.insert(record(EntryType::Totp)).await.unwrap();
        let totp = store.load_by_type(EntryType::Totp).await.unwrap();
        assert_eq!(totp.len(), 2);
        assert!(totp.iter().all(|r| r.entry_type == EntryType::Totp));
    }

    // ── Update / delete ──────────────────────────────────────────

    #[tokio::test]
    async fn update_replaces_content_and_modified_at() {
        let store = MemoryEntryStore::new();
        let inserted = store.insert(record(EntryType::Hotp)).await.unwrap();
        let later = inserted.modified_at + chrono::Duration::seconds(5);
        let updated = store
            .update(inserted.id, vec![9, 9], EntryType::Hotp, later)
            .await
            .unwrap();
        assert_eq!(updated.content, vec![9, 9]);
        assert_eq!(updated.modified_at, later);
        assert_eq!(updated.created_at, inserted.created_at);
    }

    #[tokio::test]
    async fn update_missing_id_fails() {
        let store = MemoryEntryStore::new();
        let err = store
            .update(42, vec![], EntryType::Totp, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn deleted_ids_are_never_reused() {
        let store = MemoryEntryStore::new();
        let a = store.insert(record(EntryType::Totp)).await.unwrap();
        store.delete(a.id).await.unwrap();
        let b = store.insert(record(EntryType::Totp)).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn delete_missing_id_fails() {
        let store = MemoryEntryStore::new();
        assert!(matches!(
            store.delete(7).await.unwrap_err(),
            StoreError::NotFound(7)
        ));
    }

    // ── Change feed ──────────────────────────────────────────────

    #[tokio::test]
    async fn mutations_bump_the_generation() {
        let store = MemoryEntryStore::new();
        let mut feed = store.watch();
        assert_eq!(*feed.borrow_and_update(), 0);

        let a = store.insert(record(EntryType::Totp)).await.unwrap();
        assert!(feed.has_changed().unwrap());
        feed.borrow_and_update();

        store.delete(a.id).await.unwrap();
        assert!(feed.has_changed().unwrap());
        assert_eq!(*feed.borrow_and_update(), 2);
    }

    #[tokio::test]
    async fn reads_do_not_bump_the_generation() {
        let store = MemoryEntryStore::new();
        store.insert(record(EntryType::Totp)).await.unwrap();
        let mut feed = store.watch();
        feed.borrow_and_update();
        store.load_all().await.unwrap();
        store.load_by_type(EntryType::Totp).await.unwrap();
        assert!(!feed.has_changed().unwrap());
    }
}
