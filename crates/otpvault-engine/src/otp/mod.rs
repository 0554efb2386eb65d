//! OTP engine: sub-modules.

pub mod types;
pub mod core;
pub mod uri;
pub mod codec;
pub mod generator;

// Re-export top-level items for convenience.
pub use types::*;
pub use generator::{CodeGenerator, CodeSnapshot, CodeStream, GeneratorConfig};
