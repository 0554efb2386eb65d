//! # otpvault-engine — portable one-time-password core
//!
//! Platform-independent OTP engine usable from any host:
//!
//! - **RFC 4226 / 6238** – HOTP & TOTP generation with SHA-1, SHA-256, SHA-512
//! - **Steam codes** – 5-character codes over Steam's 26-character alphabet
//! - **otpauth:// URIs** – Parsing & generation per the Google Authenticator spec,
//!   plus the `steam://SECRET` shorthand
//! - **Entry codec** – Versioned, lossless binary encoding of entries for
//!   storage and backup, with all-or-nothing batch decoding
//! - **Code streams** – Tick-driven current/next code computation with an
//!   emit-on-change policy and explicit cancellation

pub mod otp;
