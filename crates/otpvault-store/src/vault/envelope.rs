//! AES-256-GCM envelope.
//!
//! Output layout is `nonce || ciphertext+tag`: a fresh random 96-bit
//! nonce is generated per encryption and prefixed to the AEAD output
//! (which carries the 128-bit authentication tag). An optional
//! domain-separation tag goes into the associated data, so a blob
//! encrypted for one purpose never decrypts under another.

use crate::vault::error::StoreError;
use crate::vault::key::EncryptionKey;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Domain-separation tags mixed into the associated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionTag {
    /// Serialized entry content at rest.
    EntryContent,
}

impl EncryptionTag {
    fn associated_data(&self) -> &'static [u8] {
        match self {
            Self::EntryContent => b"entrycontent",
        }
    }
}

/// Encrypt/decrypt boundary bound to one key.
pub struct EncryptionContext {
    key: EncryptionKey,
}

impl EncryptionContext {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext+tag`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        tag: Option<EncryptionTag>,
    ) -> Result<Vec<u8>, StoreError> {
        let key_bytes = self.key.bytes()?;
        let cipher = Aes256Gcm::new_from_slice(key_bytes)
            .map_err(|_| StoreError::InvalidKeyLength(key_bytes.len()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: plaintext,
            aad: tag.map(|t| t.associated_data()).unwrap_or(b""),
        };
        // Encryption with a valid key cannot fail for in-memory buffers,
        // but the trait is fallible; treat failure like a bad tag.
        let ciphertext = cipher.encrypt(nonce, payload).map_err(|_| StoreError::BadTag)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a `nonce || ciphertext+tag` blob.
    ///
    /// Fails with [`StoreError::BadTag`] on any authentication failure;
    /// unauthenticated plaintext is never returned.
    pub fn decrypt(
        &self,
        blob: &[u8],
        tag: Option<EncryptionTag>,
    ) -> Result<Vec<u8>, StoreError> {
        if blob.len() < NONCE_LEN {
            return Err(StoreError::TruncatedCiphertext(blob.len()));
        }
        let key_bytes = self.key.bytes()?;
        let cipher = Aes256Gcm::new_from_slice(key_bytes)
            .map_err(|_| StoreError::InvalidKeyLength(key_bytes.len()))?;

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let payload = Payload {
            msg: ciphertext,
            aad: tag.map(|t| t.associated_data()).unwrap_or(b""),
        };
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|_| StoreError::BadTag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> EncryptionContext {
        EncryptionContext::new(EncryptionKey::generate())
    }

    // ── Round trip ───────────────────────────────────────────────

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let ctx = context();
        let blob = ctx.encrypt(b"entry bytes", Some(EncryptionTag::EntryContent)).unwrap();
        let plain = ctx.decrypt(&blob, Some(EncryptionTag::EntryContent)).unwrap();
        assert_eq!(plain, b"entry bytes");
    }

    #[test]
    fn roundtrip_without_tag() {
        let ctx = context();
        let blob = ctx.encrypt(b"data", None).unwrap();
        assert_eq!(ctx.decrypt(&blob, None).unwrap(), b"data");
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let ctx = context();
        let blob = ctx.encrypt(b"", Some(EncryptionTag::EntryContent)).unwrap();
        assert!(ctx.decrypt(&blob, Some(EncryptionTag::EntryContent)).unwrap().is_empty());
    }

    // ── Layout ───────────────────────────────────────────────────

    #[test]
    fn output_carries_nonce_and_tag_overhead() {
        let ctx = context();
        let blob = ctx.encrypt(b"12345", None).unwrap();
        // nonce (12) + plaintext (5) + GCM tag (16)
        assert_eq!(blob.len(), NONCE_LEN + 5 + 16);
    }

    #[test]
    fn nonces_are_fresh_per_encryption() {
        let ctx = context();
        let a = ctx.encrypt(b"same", None).unwrap();
        let b = ctx.encrypt(b"same", None).unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    // ── Authentication failures ──────────────────────────────────

    #[test]
    fn wrong_key_fails_closed() {
        let blob = context().encrypt(b"secret", None).unwrap();
        assert!(matches!(context().decrypt(&blob, None), Err(StoreError::BadTag)));
    }

    #[test]
    fn flipped_bit_fails_closed() {
        let ctx = context();
        let mut blob = ctx.encrypt(b"secret", None).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(ctx.decrypt(&blob, None), Err(StoreError::BadTag)));
    }

    #[test]
    fn tag_mismatch_fails_closed() {
        let ctx = context();
        let blob = ctx.encrypt(b"secret", Some(EncryptionTag::EntryContent)).unwrap();
        assert!(matches!(ctx.decrypt(&blob, None), Err(StoreError::BadTag)));
    }

    #[test]
    fn truncated_blob_rejected() {
        let ctx = context();
        assert!(matches!(
            ctx.decrypt(&[0u8; 5], None),
            Err(StoreError::TruncatedCiphertext(5))
        ));
    }

    // ── Cleared key ──────────────────────────────────────────────

    #[test]
    fn cleared_key_fails_fast() {
        let mut key = EncryptionKey::generate();
        let ctx_key = key.clone();
        key.clear();
        // The clone still works; a context over the cleared key must not.
        let good = EncryptionContext::new(ctx_key);
        let blob = good.encrypt(b"x", None).unwrap();

        let mut cleared = EncryptionKey::generate();
        cleared.clear();
        let bad = EncryptionContext::new(cleared);
        assert!(matches!(bad.encrypt(b"x", None), Err(StoreError::KeyCleared)));
        assert!(matches!(bad.decrypt(&blob, None), Err(StoreError::KeyCleared)));
    }
}
