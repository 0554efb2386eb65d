//! # otpvault-store — encrypted entry storage
//!
//! The at-rest security boundary around [`otpvault_engine`]:
//!
//! - **EncryptionKey** – 256-bit key material that can be zeroed in place,
//!   cloned for scoped use, and fails fast when used after clearing
//! - **Envelope** – AES-256-GCM with a fresh 96-bit nonce per encryption,
//!   `nonce || ciphertext+tag` layout and a domain-separating AAD tag
//! - **EntryStore** – pluggable record storage with a push-based change
//!   feed; an in-memory reference implementation is included
//! - **EntryRepository** – the read/write orchestration: parse → encode →
//!   encrypt on insert, decrypt → batch-decode → strict count check on
//!   every observed read

pub mod vault;

pub use vault::envelope::{EncryptionContext, EncryptionTag};
pub use vault::error::StoreError;
pub use vault::key::EncryptionKey;
pub use vault::repository::{EntryRepository, StoredEntry};
pub use vault::store::{EntryRecord, EntryStore, MemoryEntryStore, NewEntryRecord};
