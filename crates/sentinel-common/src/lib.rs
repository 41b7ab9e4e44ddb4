//! # Sentinel Common
//!
//! Shared types, errors, and constants used by the Sentinel mail gate.
//!
//! ## Modules
//! - `types` - Persisted records and challenge values
//! - `error` - The gate's error taxonomy
//! - `constants` - TTLs, store key prefixes, and header allow-lists

pub mod constants;
pub mod error;
pub mod types;

pub use error::SentinelError;
pub use types::*;
