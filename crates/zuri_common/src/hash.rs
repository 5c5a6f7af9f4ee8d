//! Content hashing and build fingerprints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit content hash computed using XXH3.
///
/// Used to checksum stored objects and to detect when source text changed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// The identity of a compilation unit, used as the cache key.
///
/// A fingerprint covers the source bytes, the compiler and schema versions,
/// the module id and the fingerprints of every direct dependency. Since each
/// dependency fingerprint covers its own dependencies, a change anywhere in
/// the import closure changes the fingerprint of every dependent.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// The length of a fingerprint in bytes.
    pub const LEN: usize = 16;

    /// Creates a fingerprint from its raw bytes.
    pub fn from_raw(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of this fingerprint.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the first eight hex digits, for log lines.
    pub fn short(&self) -> String {
        format!(
            "{:02x}{:02x}{:02x}{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}..)", self.short())
    }
}

/// Error returned when a string is not a 32-digit hex fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fingerprint: '{input}'")]
pub struct ParseFingerprintError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFingerprintError {
            input: s.to_string(),
        };
        let s = s.trim();
        if s.len() != Self::LEN * 2 || !s.is_ascii() {
            return Err(err());
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        Ok(Self(bytes))
    }
}

/// Incremental builder for [`Fingerprint`]s.
///
/// Every field is length-prefixed so that adjacent fields can never be
/// confused (`"ab" + "c"` hashes differently from `"a" + "bc"`).
pub struct FingerprintBuilder {
    state: Xxh3,
}

impl FingerprintBuilder {
    /// Starts a fingerprint under the given domain tag.
    pub fn new(domain: &str) -> Self {
        let mut builder = Self {
            state: Xxh3::new(),
        };
        builder.bytes(domain.as_bytes());
        builder
    }

    /// Mixes a length-prefixed byte field into the fingerprint.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.state.update(&(data.len() as u64).to_le_bytes());
        self.state.update(data);
        self
    }

    /// Mixes a string field into the fingerprint.
    pub fn str(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes())
    }

    /// Mixes an integer field into the fingerprint.
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.state.update(&value.to_le_bytes());
        self
    }

    /// Mixes another fingerprint into this one.
    pub fn fingerprint(&mut self, fp: &Fingerprint) -> &mut Self {
        self.state.update(&fp.0);
        self
    }

    /// Finishes the computation.
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.state.digest128().to_le_bytes())
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_deterministic() {
        let a = ContentHash::from_bytes(b"hello world");
        let b = ContentHash::from_bytes(b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, ContentHash::from_bytes(b"hello"));
    }

    #[test]
    fn content_hash_display_is_hex() {
        let s = ContentHash::from_bytes(b"test").to_string();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn builder_is_deterministic() {
        let a = FingerprintBuilder::new("t").str("x").u64(1).finish();
        let b = FingerprintBuilder::new("t").str("x").u64(1).finish();
        assert_eq!(a, b);
    }

    #[test]
    fn fields_are_length_prefixed() {
        let a = FingerprintBuilder::new("t").str("ab").str("c").finish();
        let b = FingerprintBuilder::new("t").str("a").str("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn domain_separates() {
        let a = FingerprintBuilder::new("one").str("x").finish();
        let b = FingerprintBuilder::new("two").str("x").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn nested_fingerprint_changes_result() {
        let dep1 = FingerprintBuilder::new("t").str("dep v1").finish();
        let dep2 = FingerprintBuilder::new("t").str("dep v2").finish();
        let a = FingerprintBuilder::new("t").fingerprint(&dep1).finish();
        let b = FingerprintBuilder::new("t").fingerprint(&dep2).finish();
        assert_ne!(a, b);
    }

    #[test]
    fn parse_display_roundtrip() {
        let fp = FingerprintBuilder::new("t").str("x").finish();
        let parsed: Fingerprint = fp.to_string().parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("xyz".parse::<Fingerprint>().is_err());
        assert!("zz".repeat(16).parse::<Fingerprint>().is_err());
    }

    #[test]
    fn debug_abbreviated() {
        let fp = Fingerprint::from_raw([0xab; 16]);
        assert_eq!(format!("{fp:?}"), "Fingerprint(abababab..)");
        assert_eq!(fp.short(), "abababab");
    }

    #[test]
    fn serde_roundtrip() {
        let fp = FingerprintBuilder::new("serde").finish();
        let json = serde_json::to_string(&fp).unwrap();
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, back);
    }
}
