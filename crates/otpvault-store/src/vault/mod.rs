//! Encrypted vault: key handling, AEAD envelope, record store and the
//! repository that ties them to the OTP engine.

pub mod envelope;
pub mod error;
pub mod key;
pub mod repository;
pub mod store;
