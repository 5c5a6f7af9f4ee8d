//! Byte sizes with unit parsing and display.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// A size in bytes.
///
/// Parses strings like `"512"`, `"64KiB"`, `"256MiB"`, `"2GiB"` as well as
/// the decimal units `KB`, `MB` and `GB`. Displays with the largest binary
/// unit that divides the value exactly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Creates a size from a byte count.
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Creates a size from a count of mebibytes.
    pub const fn mib(n: u64) -> Self {
        Self(n * MIB)
    }

    /// Returns the number of bytes.
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteSize({self})")
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        if b >= GIB && b % GIB == 0 {
            write!(f, "{}GiB", b / GIB)
        } else if b >= MIB && b % MIB == 0 {
            write!(f, "{}MiB", b / MIB)
        } else if b >= KIB && b % KIB == 0 {
            write!(f, "{}KiB", b / KIB)
        } else {
            write!(f, "{b}B")
        }
    }
}

/// Error type for parsing byte size strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid byte size: '{input}'")]
pub struct ParseByteSizeError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for ByteSize {
    type Err = ParseByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseByteSizeError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let split = lower
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(lower.len());
        let (digits, unit) = lower.split_at(split);
        let value: u64 = digits.parse().map_err(|_| err())?;
        let multiplier = match unit.trim() {
            "" | "b" => 1,
            "k" | "kib" => KIB,
            "m" | "mib" => MIB,
            "g" | "gib" => GIB,
            "kb" => 1_000,
            "mb" => 1_000_000,
            "gb" => 1_000_000_000,
            _ => return Err(err()),
        };
        value.checked_mul(multiplier).map(ByteSize).ok_or_else(err)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(ByteSize(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_binary_units() {
        assert_eq!("64KiB".parse::<ByteSize>().unwrap().bytes(), 64 * 1024);
        assert_eq!("256MiB".parse::<ByteSize>().unwrap(), ByteSize::mib(256));
        assert_eq!("2gib".parse::<ByteSize>().unwrap().bytes(), 2 * GIB);
    }

    #[test]
    fn parse_decimal_units_and_bare() {
        assert_eq!("10MB".parse::<ByteSize>().unwrap().bytes(), 10_000_000);
        assert_eq!("512".parse::<ByteSize>().unwrap().bytes(), 512);
        assert_eq!(" 7 b ".parse::<ByteSize>().unwrap().bytes(), 7);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("lots".parse::<ByteSize>().is_err());
        assert!("12parsecs".parse::<ByteSize>().is_err());
        assert!("".parse::<ByteSize>().is_err());
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!("99999999999999999999GiB".parse::<ByteSize>().is_err());
        assert!("18446744073709551615GiB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn display_picks_exact_unit() {
        assert_eq!(ByteSize::mib(256).to_string(), "256MiB");
        assert_eq!(ByteSize::new(1536).to_string(), "1536B");
        assert_eq!(ByteSize::new(2048).to_string(), "2KiB");
        assert_eq!(ByteSize::new(0).to_string(), "0B");
    }

    #[test]
    fn deserialize_number_or_string() {
        let a: ByteSize = serde_json::from_str("1024").unwrap();
        let b: ByteSize = serde_json::from_str("\"1KiB\"").unwrap();
        assert_eq!(a, b);
    }
}
