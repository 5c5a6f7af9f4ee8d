//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::WorkspaceConfig;
use std::path::Path;

/// The configuration file name looked up in a workspace root.
pub const CONFIG_FILE_NAME: &str = "zuri.toml";

/// Loads and validates `<workspace_dir>/zuri.toml`.
pub fn load_config(workspace_dir: &Path) -> Result<WorkspaceConfig, ConfigError> {
    let config_path = workspace_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<WorkspaceConfig, ConfigError> {
    let config: WorkspaceConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &WorkspaceConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField { field: "project.name" });
    }
    if matches!(config.project.main.as_deref(), Some("")) {
        return Err(ConfigError::MissingField { field: "project.main" });
    }
    if config.sources.roots.is_empty() {
        return Err(ConfigError::invalid("sources.roots", "must list at least one directory"));
    }
    let ext = &config.sources.extension;
    if ext.is_empty() || ext.contains('.') {
        return Err(ConfigError::invalid(
            "sources.extension",
            format!("'{ext}' must be non-empty and contain no '.'"),
        ));
    }
    if config.cache.dir.is_empty() {
        return Err(ConfigError::MissingField { field: "cache.dir" });
    }
    let retry = &config.cache.retry;
    if retry.attempts == 0 {
        return Err(ConfigError::invalid("cache.retry.attempts", "must be at least 1"));
    }
    if retry.max_backoff < retry.initial_backoff {
        return Err(ConfigError::invalid(
            "cache.retry.max_backoff",
            "must not be smaller than initial_backoff",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;
    use std::time::Duration;
    use zuri_common::ByteSize;

    #[test]
    fn parse_minimal_config() {
        let config = load_config_from_str(
            r#"
[project]
name = "demo"
version = "0.1.0"
"#,
        )
        .unwrap();
        assert_eq!(config.project.name, "demo");
        assert!(config.project.main.is_none());
        assert_eq!(config.sources.roots, vec!["src"]);
        assert_eq!(config.sources.extension, "zr");
        assert_eq!(config.build.jobs, 0);
        assert!(!config.build.optimize);
        assert_eq!(config.cache.dir, ".zuri/cache");
        assert_eq!(config.cache.max_size, ByteSize::mib(256));
        assert_eq!(config.cache.retry.attempts, 3);
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn parse_full_config() {
        let config = load_config_from_str(
            r#"
[project]
name = "demo"
version = "0.2.0"
description = "calculator"
main = "app.main"

[sources]
roots = ["src", "vendor"]
extension = "zuri"

[build]
jobs = 4
optimize = true
wait_timeout = "2s"

[cache]
dir = "target/zuri"
max_size = "64MiB"
max_age = "7d"
io_timeout = "250ms"

[cache.retry]
attempts = 5
initial_backoff = "5ms"
max_backoff = "1s"

[log]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(config.project.main.as_deref(), Some("app.main"));
        assert_eq!(config.sources.roots.len(), 2);
        assert_eq!(config.build.jobs, 4);
        assert!(config.build.optimize);
        assert_eq!(config.build.wait_timeout.0, Duration::from_secs(2));
        assert_eq!(config.cache.max_size, ByteSize::mib(64));
        assert_eq!(config.cache.max_age.0, Duration::from_secs(7 * 86_400));
        assert_eq!(config.cache.io_timeout.0, Duration::from_millis(250));
        assert_eq!(config.cache.retry.attempts, 5);
        assert_eq!(config.log.level, LogLevel::Debug);
    }

    #[test]
    fn missing_name_errors() {
        let err = load_config_from_str(
            r#"
[project]
name = ""
version = "0.1.0"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "project.name" }));
    }

    #[test]
    fn version_is_required() {
        let err = load_config_from_str("[project]\nname = \"x\"\n").unwrap_err();
        let ConfigError::Parse { message } = err else {
            panic!("expected a parse error, got {err:?}");
        };
        assert!(message.contains("version"), "{message}");
    }

    #[test]
    fn empty_main_errors() {
        let err = load_config_from_str(
            r#"
[project]
name = "x"
version = "0.1.0"
main = ""
"#,
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("project.main"));
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = load_config_from_str(
            r#"
[project]
name = "x"
version = "0.1.0"

[cache.retry]
attempts = 0
"#,
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("cache.retry.attempts"));
    }

    #[test]
    fn inverted_backoff_rejected() {
        let err = load_config_from_str(
            r#"
[project]
name = "x"
version = "0.1.0"

[cache.retry]
initial_backoff = "1s"
max_backoff = "10ms"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "cache.retry.max_backoff", .. }));
    }

    #[test]
    fn bad_duration_is_parse_error() {
        let err = load_config_from_str(
            r#"
[project]
name = "x"
version = "0.1.0"

[build]
wait_timeout = "soon"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[project]\nname = \"disk\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project.name, "disk");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config(dir.path()),
            Err(ConfigError::Io { .. })
        ));
    }
}
