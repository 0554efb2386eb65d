use otpvault_engine::otp::OtpError;
use thiserror::Error;

/// Errors of the storage and crypto layer.
///
/// Decode failures from the engine pass through as [`StoreError::Entry`];
/// everything crypto- or consistency-related has its own variant so
/// callers can distinguish user-recoverable failures from faults.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Ciphertext failed AEAD authentication: wrong key, wrong associated
    /// data, or tampered data. No plaintext is ever returned in this case.
    #[error("decryption failed: authentication tag mismatch")]
    BadTag,

    /// The encryption key was used after `clear()`.
    #[error("encryption key has been cleared")]
    KeyCleared,

    /// Key material of the wrong size.
    #[error("invalid key length {0}, expected 32 bytes")]
    InvalidKeyLength(usize),

    /// Ciphertext shorter than the nonce prefix it must start with.
    #[error("ciphertext too short: {0} bytes")]
    TruncatedCiphertext(usize),

    /// Batch read consistency fault: the store returned a different
    /// number of records than the codec produced entries. Fails the whole
    /// read, never a partial result.
    #[error("decrypted {records} records but decoded {entries} entries")]
    CountMismatch { records: usize, entries: usize },

    /// Entry-level parse/codec failure.
    #[error("entry error: {0}")]
    Entry(#[from] OtpError),

    /// No record with the requested id.
    #[error("record not found: {0}")]
    NotFound(i64),
}
