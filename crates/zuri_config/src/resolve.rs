//! Resolution of a parsed configuration into runtime settings.

use crate::error::ConfigError;
use crate::types::{LogLevel, WorkspaceConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything the toolchain needs, with paths made absolute.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The workspace root (directory of `zuri.toml`).
    pub root: PathBuf,
    /// The project name.
    pub project_name: String,
    /// The entry module for `zuri run`, if configured.
    pub main: Option<String>,
    /// Absolute source roots in search order.
    pub source_roots: Vec<PathBuf>,
    /// Module file extension.
    pub extension: String,
    /// Worker threads for graph builds (0 = one per core).
    pub jobs: usize,
    /// Whether to fold constants after lowering.
    pub optimize: bool,
    /// Maximum wait on another caller's in-flight build.
    pub wait_timeout: Duration,
    /// Cache settings.
    pub cache: CacheSettings,
    /// Default log level.
    pub log_level: LogLevel,
}

/// Resolved cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Absolute cache directory.
    pub dir: PathBuf,
    /// Size budget in bytes.
    pub max_bytes: u64,
    /// Maximum entry age.
    pub max_age: Duration,
    /// Timeout for one store operation.
    pub io_timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetrySettings,
}

/// Resolved retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    /// Total attempts including the first.
    pub attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

/// Resolves `config`, loaded from the workspace at `root`, into [`Settings`].
pub fn resolve_settings(config: &WorkspaceConfig, root: &Path) -> Result<Settings, ConfigError> {
    let source_roots = config
        .sources
        .roots
        .iter()
        .map(|r| absolutize(root, r))
        .collect::<Vec<_>>();
    if source_roots.is_empty() {
        return Err(ConfigError::invalid("sources.roots", "must list at least one directory"));
    }

    Ok(Settings {
        root: root.to_path_buf(),
        project_name: config.project.name.clone(),
        main: config.project.main.clone(),
        source_roots,
        extension: config.sources.extension.clone(),
        jobs: config.build.jobs,
        optimize: config.build.optimize,
        wait_timeout: config.build.wait_timeout.0,
        cache: CacheSettings {
            dir: absolutize(root, &config.cache.dir),
            max_bytes: config.cache.max_size.bytes(),
            max_age: config.cache.max_age.0,
            io_timeout: config.cache.io_timeout.0,
            retry: RetrySettings {
                attempts: config.cache.retry.attempts,
                initial_backoff: config.cache.retry.initial_backoff.0,
                max_backoff: config.cache.retry.max_backoff.0,
            },
        },
        log_level: config.log.level,
    })
}

fn absolutize(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}
