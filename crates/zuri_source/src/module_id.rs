//! Dotted module identifiers such as `app.main`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The name of a module: one or more identifier segments joined by `.`.
///
/// Module ids are what `import` statements name and what the
/// [`SourceProvider`](crate::SourceProvider) resolves.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(String);

/// Error returned for malformed module ids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid module id '{input}': {reason}")]
pub struct ParseModuleIdError {
    /// The rejected input.
    pub input: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl ModuleId {
    /// Parses and validates a dotted module id.
    pub fn parse(s: &str) -> Result<Self, ParseModuleIdError> {
        let err = |reason| ParseModuleIdError {
            input: s.to_string(),
            reason,
        };
        if s.is_empty() {
            return Err(err("empty module id"));
        }
        for segment in s.split('.') {
            let mut chars = segment.chars();
            match chars.next() {
                None => return Err(err("empty segment")),
                Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
                    return Err(err("segment must start with a letter or '_'"))
                }
                _ => {}
            }
            if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(err("segment contains an invalid character"));
            }
        }
        Ok(Self(s.to_string()))
    }

    /// Builds a module id from already-validated segments.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, ParseModuleIdError> {
        let joined: Vec<&str> = segments.iter().map(|s| s.as_ref()).collect();
        Self::parse(&joined.join("."))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the dotted segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Returns the final segment (`main` for `app.main`).
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Returns the relative path of this module's source file.
    pub fn relative_path(&self, extension: &str) -> PathBuf {
        let mut path: PathBuf = self.segments().collect();
        path.set_extension(extension);
        path
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.0)
    }
}

impl FromStr for ModuleId {
    type Err = ParseModuleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
