//! Core types for the OTP engine.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hash algorithm used for HMAC-based OTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Sha1
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
            Self::Sha512 => write!(f, "SHA512"),
        }
    }
}

impl Algorithm {
    /// Parse from a case-insensitive string.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SHA1" | "SHA-1" | "HMACSHA1" | "HMAC-SHA1" => Some(Self::Sha1),
            "SHA256" | "SHA-256" | "HMACSHA256" | "HMAC-SHA256" => Some(Self::Sha256),
            "SHA512" | "SHA-512" | "HMACSHA512" | "HMAC-SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// URI-safe name for `otpauth://` parameters.
    pub fn uri_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Stable single-byte discriminant used by the entry codec.
    pub(crate) fn wire_tag(&self) -> u8 {
        match self {
            Self::Sha1 => 0,
            Self::Sha256 => 1,
            Self::Sha512 => 2,
        }
    }

    pub(crate) fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Sha1),
            1 => Some(Self::Sha256),
            2 => Some(Self::Sha512),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Entry type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which code family an entry belongs to.
///
/// A closed set: the generator and codec match exhaustively over it, so
/// adding a variant is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Time-based, RFC 6238.
    Totp,
    /// Counter-based, RFC 4226.
    Hotp,
    /// Time-based with Steam's fixed 5-character alphabet.
    Steam,
}

impl Default for EntryType {
    fn default() -> Self {
        Self::Totp
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Totp => write!(f, "totp"),
            Self::Hotp => write!(f, "hotp"),
            Self::Steam => write!(f, "steam"),
        }
    }
}

impl EntryType {
    /// `true` for the variants whose codes roll over on a time period.
    pub fn is_time_based(&self) -> bool {
        matches!(self, Self::Totp | Self::Steam)
    }

    pub(crate) fn wire_tag(&self) -> u8 {
        match self {
            Self::Totp => 0,
            Self::Hotp => 1,
            Self::Steam => 2,
        }
    }

    pub(crate) fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Totp),
            1 => Some(Self::Hotp),
            2 => Some(Self::Steam),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Smallest supported code length for TOTP/HOTP entries.
pub const MIN_DIGITS: u8 = 6;
/// Largest supported code length for TOTP/HOTP entries.
pub const MAX_DIGITS: u8 = 8;
/// Fixed code length for Steam entries.
pub const STEAM_DIGITS: u8 = 5;
/// Fixed period in seconds for Steam entries.
pub const STEAM_PERIOD: u32 = 30;
/// Default period in seconds for TOTP entries.
pub const DEFAULT_PERIOD: u32 = 30;
/// Default code length.
pub const DEFAULT_DIGITS: u8 = 6;

/// A single 2FA credential.
///
/// The secret is held as raw bytes, decoded from its transport encoding at
/// parse time. `period` is authoritative only for time-based entries and
/// `counter` only for HOTP; the accessors [`Entry::effective_period`] and
/// exhaustive matching in the generator keep reads on the right field.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Account label (e.g. "user@example.com").
    pub name: String,
    /// Issuer (e.g. "GitHub"), if known.
    pub issuer: Option<String>,
    /// Raw shared-secret bytes. Never logged, never shown in `Debug`.
    pub secret: Vec<u8>,
    /// HMAC hash algorithm.
    pub algorithm: Algorithm,
    /// Code length. Fixed at 5 for Steam entries.
    pub digits: u8,
    /// TOTP, HOTP or Steam.
    pub entry_type: EntryType,
    /// Validity window in seconds (time-based entries only).
    pub period: u32,
    /// Counter value (HOTP only).
    pub counter: u64,
    /// Free-form user note.
    pub note: Option<String>,
}

// Manual Debug so a stray `{:?}` can never leak secret material.
impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("issuer", &self.issuer)
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("digits", &self.digits)
            .field("entry_type", &self.entry_type)
            .field("period", &self.period)
            .field("counter", &self.counter)
            .field("note", &self.note)
            .finish()
    }
}

impl Entry {
    /// Build a validated TOTP entry.
    pub fn totp(
        name: impl Into<String>,
        secret: Vec<u8>,
        algorithm: Algorithm,
        digits: u8,
        period: u32,
    ) -> Result<Self, OtpError> {
        let entry = Self {
            name: name.into(),
            issuer: None,
            secret,
            algorithm,
            digits,
            entry_type: EntryType::Totp,
            period,
            counter: 0,
            note: None,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Build a validated HOTP entry.
    pub fn hotp(
        name: impl Into<String>,
        secret: Vec<u8>,
        algorithm: Algorithm,
        digits: u8,
        counter: u64,
    ) -> Result<Self, OtpError> {
        let entry = Self {
            name: name.into(),
            issuer: None,
            secret,
            algorithm,
            digits,
            entry_type: EntryType::Hotp,
            period: DEFAULT_PERIOD,
            counter,
            note: None,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Build a validated Steam entry. Digits and period are fixed; any
    /// caller-supplied values are ignored by construction.
    pub fn steam(name: impl Into<String>, secret: Vec<u8>) -> Result<Self, OtpError> {
        let entry = Self {
            name: name.into(),
            issuer: Some("Steam".to_string()),
            secret,
            algorithm: Algorithm::Sha1,
            digits: STEAM_DIGITS,
            entry_type: EntryType::Steam,
            period: STEAM_PERIOD,
            counter: 0,
            note: None,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Builder: set issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Builder: set note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Check the entry invariants. Run by every constructor and by the
    /// codec after decoding.
    pub fn validate(&self) -> Result<(), OtpError> {
        if self.secret.is_empty() {
            return Err(OtpError::new(OtpErrorKind::InvalidSecret, "empty secret"));
        }
        match self.entry_type {
            EntryType::Steam => {
                if self.digits != STEAM_DIGITS {
                    return Err(OtpError::new(
                        OtpErrorKind::UnsupportedDigits,
                        format!("steam entries are fixed at {} digits", STEAM_DIGITS),
                    ));
                }
            }
            EntryType::Totp | EntryType::Hotp => {
                if !(MIN_DIGITS..=MAX_DIGITS).contains(&self.digits) {
                    return Err(OtpError::new(
                        OtpErrorKind::UnsupportedDigits,
                        format!("digits must be {}..={}, got {}", MIN_DIGITS, MAX_DIGITS, self.digits),
                    ));
                }
            }
        }
        if self.entry_type.is_time_based() && self.period == 0 {
            return Err(OtpError::new(OtpErrorKind::InvalidPeriod, "period must be > 0"));
        }
        Ok(())
    }

    /// Validity window, meaningful only for time-based entries.
    pub fn effective_period(&self) -> u32 {
        match self.entry_type {
            EntryType::Steam => STEAM_PERIOD,
            EntryType::Totp | EntryType::Hotp => self.period,
        }
    }

    /// Display name: "Issuer (name)" or just "name".
    pub fn display_name(&self) -> String {
        match &self.issuer {
            Some(iss) if !iss.is_empty() => format!("{} ({})", iss, self.name),
            _ => self.name.clone(),
        }
    }

    /// Secret re-encoded as unpadded base-32 (for URI export).
    pub fn secret_base32(&self) -> String {
        base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &self.secret)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generated code
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A generated code pair with timing info. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCode {
    /// Code for the current step.
    pub current_code: String,
    /// Code for the next step, precomputed so display can pre-render the
    /// upcoming value without a gap at rollover.
    pub next_code: String,
    /// Seconds left in the current window. For HOTP this is the poll
    /// interval of the stream that produced it.
    pub seconds_remaining: u32,
    /// The time step (time-based) or counter (HOTP) used for `current_code`.
    pub step: u64,
}

/// Result of verifying a code against an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub valid: bool,
    /// How many steps or counters off the match was (0 = exact).
    pub drift: i64,
    /// The counter value that matched (if any).
    pub matched_counter: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpErrorKind {
    /// Secret failed to decode or decoded to empty bytes.
    InvalidSecret,
    /// Requested code length outside the supported set.
    UnsupportedDigits,
    /// Zero or otherwise unusable period.
    InvalidPeriod,
    /// Not an `otpauth://` / `steam://` URI this engine understands.
    UnrecognizedUri,
    /// Serialized entry record is truncated, version-skewed or corrupt.
    MalformedRecord,
}

/// Crate-level error: a kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpError {
    pub kind: OtpErrorKind,
    pub message: String,
}

impl OtpError {
    pub fn new(kind: OtpErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }
}

impl fmt::Display for OtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for OtpError {}
