//! Shared foundational types used across the Zuri toolchain.
//!
//! This crate provides content hashes and build fingerprints, interned
//! identifiers, human-readable byte sizes, cooperative cancellation tokens,
//! and the internal error type.

#![warn(missing_docs)]

pub mod cancel;
pub mod hash;
pub mod ident;
pub mod result;
pub mod size;

pub use cancel::CancellationToken;
pub use hash::{ContentHash, Fingerprint, FingerprintBuilder, ParseFingerprintError};
pub use ident::{Ident, Interner};
pub use result::InternalError;
pub use size::{ByteSize, ParseByteSizeError};

/// The version string of this toolchain, mixed into every fingerprint.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");
