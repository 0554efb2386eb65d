//! Entry repository: the orchestration layer between the OTP engine and
//! the encrypted store.
//!
//! Writes go parse → encode → encrypt → insert, with `created_at` equal
//! to `modified_at` on creation. Reads go load → decrypt → batch decode
//! → zip with record metadata, and a whole read fails if the record and
//! entry counts ever disagree: that is a consistency fault, not a
//! condition to paper over with a partial result.

use crate::vault::envelope::{EncryptionContext, EncryptionTag};
use crate::vault::error::StoreError;
use crate::vault::key::EncryptionKey;
use crate::vault::store::{EntryRecord, EntryStore, NewEntryRecord};
use chrono::{DateTime, Utc};
use otpvault_engine::otp::codec;
use otpvault_engine::otp::uri::{self, SteamParams, TotpParams};
use otpvault_engine::otp::{Entry, EntryType};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A decrypted entry together with its record metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub id: i64,
    pub entry: Entry,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Repository over an [`EntryStore`] and one encryption key.
#[derive(Clone)]
pub struct EntryRepository {
    store: Arc<dyn EntryStore>,
    crypto: Arc<EncryptionContext>,
}

impl EntryRepository {
    pub fn new(store: Arc<dyn EntryStore>, key: EncryptionKey) -> Self {
        Self {
            store,
            crypto: Arc::new(EncryptionContext::new(key)),
        }
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Parse a provisioning URI and persist the resulting entry.
    pub async fn insert_uri(&self, uri_str: &str) -> Result<StoredEntry, StoreError> {
        let entry = uri::parse_uri(uri_str)?;
        self.insert_entry(entry).await
    }

    /// Persist an entry from manual TOTP fields.
    pub async fn insert_totp(&self, params: &TotpParams) -> Result<StoredEntry, StoreError> {
        let entry = uri::entry_from_totp_params(params)?;
        self.insert_entry(entry).await
    }

    /// Persist an entry from manual Steam fields.
    pub async fn insert_steam(&self, params: &SteamParams) -> Result<StoredEntry, StoreError> {
        let entry = uri::entry_from_steam_params(params)?;
        self.insert_entry(entry).await
    }

    /// Encode, encrypt and store a validated entry. The record's type
    /// column comes from the entry itself, and both timestamps are the
    /// same "now" on creation.
    pub async fn insert_entry(&self, entry: Entry) -> Result<StoredEntry, StoreError> {
        let content = self.encode(&entry)?;
        let now = Utc::now();
        let record = self
            .store
            .insert(NewEntryRecord {
                content,
                entry_type: entry.entry_type,
                created_at: now,
                modified_at: now,
            })
            .await?;
        log::debug!("stored new {} entry id={}", entry.entry_type, record.id);
        Ok(StoredEntry {
            id: record.id,
            entry,
            created_at: record.created_at,
            modified_at: record.modified_at,
        })
    }

    /// Re-encode and re-encrypt an existing record, bumping
    /// `modified_at`. This is also how an HOTP counter advance is
    /// persisted after a code has been shown.
    pub async fn update_entry(&self, id: i64, entry: Entry) -> Result<StoredEntry, StoreError> {
        let content = self.encode(&entry)?;
        let record = self
            .store
            .update(id, content, entry.entry_type, Utc::now())
            .await?;
        Ok(StoredEntry {
            id: record.id,
            entry,
            created_at: record.created_at,
            modified_at: record.modified_at,
        })
    }

    /// Delete a record.
    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.store.delete(id).await
    }

    fn encode(&self, entry: &Entry) -> Result<Vec<u8>, StoreError> {
        let plain = codec::serialize_entry(entry)?;
        self.crypto.encrypt(&plain, Some(EncryptionTag::EntryContent))
    }

    // ── Reads ───────────────────────────────────────────────────

    /// One-shot read of every stored entry, in creation order.
    pub async fn list_all(&self) -> Result<Vec<StoredEntry>, StoreError> {
        let records = self.store.load_all().await?;
        self.decode_records(records)
    }

    /// One-shot read of every stored entry of one type.
    pub async fn list_by_type(&self, entry_type: EntryType) -> Result<Vec<StoredEntry>, StoreError> {
        let records = self.store.load_by_type(entry_type).await?;
        self.decode_records(records)
    }

    fn decode_records(&self, records: Vec<EntryRecord>) -> Result<Vec<StoredEntry>, StoreError> {
        let blobs = records
            .iter()
            .map(|r| self.crypto.decrypt(&r.content, Some(EncryptionTag::EntryContent)))
            .collect::<Result<Vec<_>, _>>()?;
        let entries = codec::deserialize_entries(&blobs)?;
        zip_records(records, entries)
    }

    /// Subscribe to the full entry list.
    ///
    /// The feed immediately yields the current state, then yields again
    /// after every store mutation. A failing read is delivered as an
    /// `Err` item; the subscription itself stays alive so a later
    /// mutation can recover it.
    pub fn observe_all(&self) -> EntryFeed {
        let (tx, rx) = mpsc::channel(8);
        let repo = self.clone();
        let handle = tokio::spawn(async move {
            let mut changes = repo.store.watch();
            changes.mark_changed(); // deliver the current state first
            loop {
                if changes.changed().await.is_err() {
                    // Store dropped; nothing further can arrive.
                    return;
                }
                changes.borrow_and_update();
                let snapshot = repo.list_all().await;
                if tx.send(snapshot).await.is_err() {
                    log::debug!("entry feed closed by subscriber");
                    return;
                }
            }
        });
        EntryFeed { rx, handle }
    }
}

/// Pair records with their decoded entries, enforcing count parity.
fn zip_records(
    records: Vec<EntryRecord>,
    entries: Vec<Entry>,
) -> Result<Vec<StoredEntry>, StoreError> {
    if records.len() != entries.len() {
        return Err(StoreError::CountMismatch {
            records: records.len(),
            entries: entries.len(),
        });
    }
    Ok(records
        .into_iter()
        .zip(entries)
        .map(|(record, entry)| StoredEntry {
            id: record.id,
            entry,
            created_at: record.created_at,
            modified_at: record.modified_at,
        })
        .collect())
}

/// A live subscription produced by [`EntryRepository::observe_all`].
pub struct EntryFeed {
    rx: mpsc::Receiver<Result<Vec<StoredEntry>, StoreError>>,
    handle: JoinHandle<()>,
}

impl EntryFeed {
    /// Next snapshot, or `None` once the feed has been cancelled.
    pub async fn next(&mut self) -> Option<Result<Vec<StoredEntry>, StoreError>> {
        self.rx.recv().await
    }

    /// Stop the subscription.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl futures::Stream for EntryFeed {
    type Item = Result<Vec<StoredEntry>, StoreError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for EntryFeed {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
