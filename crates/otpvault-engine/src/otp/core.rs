//! Core OTP computation — RFC 4226 (HOTP), RFC 6238 (TOTP) and Steam codes.
//!
//! HMAC over an 8-byte big-endian step counter, dynamic truncation per
//! RFC 4226 §5.3, decimal or Steam-alphabet rendering, verification with a
//! configurable drift window, and secret decoding helpers.

use crate::otp::types::*;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

/// Steam's code alphabet: 26 characters, no ambiguous glyphs.
const STEAM_ALPHABET: &[u8; 26] = b"23456789BCDFGHJKMNPQRTVWXY";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HMAC and truncation (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute HMAC(key, message) using the specified algorithm.
fn compute_hmac(key: &[u8], data: &[u8], algo: Algorithm) -> Vec<u8> {
    match algo {
        Algorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        Algorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Dynamic truncation: 4-bit offset from the last byte, 31-bit integer
/// extracted at that offset.
fn truncate_to_u32(hmac_result: &[u8]) -> u32 {
    let offset = (hmac_result[hmac_result.len() - 1] & 0x0f) as usize;
    ((hmac_result[offset] as u32 & 0x7f) << 24)
        | ((hmac_result[offset + 1] as u32) << 16)
        | ((hmac_result[offset + 2] as u32) << 8)
        | (hmac_result[offset + 3] as u32)
}

/// Decimal rendering: `binary mod 10^digits`, zero-padded.
fn render_decimal(binary: u32, digits: u8) -> String {
    let modulus = 10u32.pow(digits as u32);
    format!("{:0>width$}", binary % modulus, width = digits as usize)
}

/// Steam rendering: repeated division through the 26-character alphabet,
/// always 5 characters.
fn render_steam(binary: u32) -> String {
    let mut value = binary;
    let mut out = String::with_capacity(STEAM_DIGITS as usize);
    for _ in 0..STEAM_DIGITS {
        out.push(STEAM_ALPHABET[(value as usize) % STEAM_ALPHABET.len()] as char);
        value /= STEAM_ALPHABET.len() as u32;
    }
    out
}

/// Compute a raw HOTP code for key bytes and a step counter.
pub fn hotp_raw(key: &[u8], counter: u64, digits: u8, algo: Algorithm) -> String {
    let hmac_result = compute_hmac(key, &counter.to_be_bytes(), algo);
    render_decimal(truncate_to_u32(&hmac_result), digits)
}

/// Compute a Steam code for key bytes and a step counter.
pub fn steam_raw(key: &[u8], counter: u64) -> String {
    let hmac_result = compute_hmac(key, &counter.to_be_bytes(), Algorithm::Sha1);
    render_steam(truncate_to_u32(&hmac_result))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Time steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the time-step counter for a given unix timestamp.
pub fn time_step_at(unix_seconds: u64, period: u32) -> u64 {
    unix_seconds / period as u64
}

/// Seconds remaining in the current window for a specific timestamp.
pub fn seconds_remaining_at(unix_seconds: u64, period: u32) -> u32 {
    let p = period as u64;
    (p - (unix_seconds % p)) as u32
}

/// Current unix timestamp in seconds.
pub fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Per-entry code computation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the code string an entry yields at an explicit step counter.
pub fn code_at_step(entry: &Entry, step: u64) -> String {
    match entry.entry_type {
        EntryType::Totp | EntryType::Hotp => {
            hotp_raw(&entry.secret, step, entry.digits, entry.algorithm)
        }
        EntryType::Steam => steam_raw(&entry.secret, step),
    }
}

/// Compute the current/next code pair for an entry at a unix timestamp.
///
/// For time-based entries the next code is the one at step+1; for HOTP it
/// is the code at counter+1. HOTP's `seconds_remaining` is 0 here — a code
/// stream substitutes its own poll interval.
pub fn generate_at(entry: &Entry, unix_seconds: u64) -> Result<EntryCode, OtpError> {
    entry.validate()?;
    let (step, seconds_remaining) = match entry.entry_type {
        EntryType::Totp | EntryType::Steam => {
            let period = entry.effective_period();
            (
                time_step_at(unix_seconds, period),
                seconds_remaining_at(unix_seconds, period),
            )
        }
        EntryType::Hotp => (entry.counter, 0),
    };
    Ok(EntryCode {
        current_code: code_at_step(entry, step),
        next_code: code_at_step(entry, step + 1),
        seconds_remaining,
        step,
    })
}

/// Compute the current/next code pair at the current time.
pub fn generate(entry: &Entry) -> Result<EntryCode, OtpError> {
    generate_at(entry, current_unix_time())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Verification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Verify a code against an entry at a specific timestamp.
///
/// `drift_window` is how many steps to check around the current value:
/// time-based entries search ±window, HOTP searches forward only.
pub fn verify_at(
    entry: &Entry,
    code: &str,
    drift_window: u32,
    unix_seconds: u64,
) -> Result<VerifyResult, OtpError> {
    entry.validate()?;

    let base_counter = match entry.entry_type {
        EntryType::Totp | EntryType::Steam => {
            time_step_at(unix_seconds, entry.effective_period())
        }
        EntryType::Hotp => entry.counter,
    };

    if code.len() != entry.digits as usize {
        return Ok(VerifyResult {
            valid: false,
            drift: 0,
            matched_counter: None,
        });
    }

    let start = if entry.entry_type == EntryType::Hotp {
        base_counter
    } else {
        base_counter.saturating_sub(drift_window as u64)
    };
    let end = base_counter + drift_window as u64;

    for c in start..=end {
        let generated = code_at_step(entry, c);
        if constant_time_eq(generated.as_bytes(), code.as_bytes()) {
            return Ok(VerifyResult {
                valid: true,
                drift: c as i64 - base_counter as i64,
                matched_counter: Some(c),
            });
        }
    }

    Ok(VerifyResult {
        valid: false,
        drift: 0,
        matched_counter: None,
    })
}

/// Verify at the current time.
pub fn verify(entry: &Entry, code: &str, drift_window: u32) -> Result<VerifyResult, OtpError> {
    verify_at(entry, code, drift_window, current_unix_time())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secret decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decode a base-32 secret (spaces/dashes stripped, case-insensitive,
/// padding optional). Fails on empty output.
pub fn decode_base32_secret(s: &str) -> Result<Vec<u8>, OtpError> {
    let cleaned = s.replace(' ', "").replace('-', "").to_uppercase();
    let padded = pad_base32(&cleaned);
    let bytes = base32::decode(base32::Alphabet::Rfc4648 { padding: true }, &padded)
        .or_else(|| base32::decode(base32::Alphabet::Rfc4648 { padding: false }, &cleaned))
        .ok_or_else(|| OtpError::new(OtpErrorKind::InvalidSecret, "invalid base-32 secret"))?;
    if bytes.is_empty() {
        return Err(OtpError::new(OtpErrorKind::InvalidSecret, "empty secret"));
    }
    Ok(bytes)
}

/// Decode a Steam secret: base-32 first, then base-64, then hex.
pub fn decode_steam_secret(s: &str) -> Result<Vec<u8>, OtpError> {
    if let Ok(bytes) = decode_base32_secret(s) {
        return Ok(bytes);
    }
    use base64::Engine as _;
    if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(s.trim()) {
        if !bytes.is_empty() {
            return Ok(bytes);
        }
    }
    if let Ok(bytes) = hex::decode(s.trim()) {
        if !bytes.is_empty() {
            return Ok(bytes);
        }
    }
    Err(OtpError::new(
        OtpErrorKind::InvalidSecret,
        "steam secret is not base-32, base-64 or hex",
    ))
}

/// Generate a cryptographically-random secret of `byte_length` bytes,
/// returned as unpadded base-32.
pub fn generate_secret(byte_length: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; byte_length];
    rand::thread_rng().fill_bytes(&mut buf);
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, &buf)
}

/// Pad a base-32 string to a multiple of 8 with '='.
fn pad_base32(s: &str) -> String {
    let remainder = s.len() % 8;
    if remainder == 0 {
        s.to_string()
    } else {
        format!("{}{}", s, "=".repeat(8 - remainder))
    }
}

/// Constant-time comparison (prevents timing attacks on verification).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
