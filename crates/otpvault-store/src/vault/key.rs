//! 256-bit encryption key with explicit lifecycle control.

use crate::vault::error::StoreError;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// A 256-bit symmetric key.
///
/// The key can be cleared in place with [`EncryptionKey::clear`], after
/// which every use fails with [`StoreError::KeyCleared`] instead of
/// silently encrypting under zeros. Clones are independent copies, so a
/// caller can hand out a scoped clone and clear it when done. The
/// backing bytes are also zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
}

// All-zero doubles as the cleared sentinel, so `{:?}` shows state only.
impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("cleared", &self.is_cleared())
            .finish()
    }
}

impl EncryptionKey {
    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Wrap caller-provided key material.
    ///
    /// Rejects wrong lengths, and rejects all-zero material because it
    /// is indistinguishable from a cleared key.
    pub fn from_bytes(material: &[u8]) -> Result<Self, StoreError> {
        if material.len() != KEY_LEN {
            return Err(StoreError::InvalidKeyLength(material.len()));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(material);
        let key = Self { bytes };
        if key.is_cleared() {
            return Err(StoreError::KeyCleared);
        }
        Ok(key)
    }

    /// Borrow the raw key bytes, failing fast after [`Self::clear`].
    pub fn bytes(&self) -> Result<&[u8; KEY_LEN], StoreError> {
        if self.is_cleared() {
            return Err(StoreError::KeyCleared);
        }
        Ok(&self.bytes)
    }

    /// Overwrite the key material with zeros, in place.
    pub fn clear(&mut self) {
        self.bytes.zeroize();
    }

    /// Whether the key has been cleared.
    pub fn is_cleared(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}
