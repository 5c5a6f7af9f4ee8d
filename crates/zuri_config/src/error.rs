//! Errors raised while loading `zuri.toml`.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `zuri.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML content could not be parsed, or a value had the wrong shape.
    #[error("failed to parse configuration: {message}")]
    Parse {
        /// The parser's message, including the location.
        message: String,
    },

    /// A required field is missing or empty.
    #[error("missing required field: {field}")]
    MissingField {
        /// Dotted path of the field, e.g. `project.name`.
        field: &'static str,
    },

    /// A field is present but its value is not allowed.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted path of the field.
        field: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// The dotted field path this error is about, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingField { field } | ConfigError::Invalid { field, .. } => Some(field),
            ConfigError::Io { .. } | ConfigError::Parse { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_names_the_field() {
        let err = ConfigError::invalid("cache.retry.attempts", "must be at least 1");
        assert_eq!(err.to_string(), "invalid cache.retry.attempts: must be at least 1");
        assert_eq!(err.field(), Some("cache.retry.attempts"));
    }

    #[test]
    fn io_error_mentions_the_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("/work/zuri.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "failed to read configuration /work/zuri.toml: not found");
        assert_eq!(err.field(), None);
    }
}
