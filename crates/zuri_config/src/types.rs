//! Configuration types deserialized from `zuri.toml`.

use crate::duration::HumanDuration;
use serde::Deserialize;
use zuri_common::ByteSize;

/// The top-level workspace configuration.
#[derive(Debug, Deserialize)]
pub struct WorkspaceConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Where module sources live.
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Compilation settings.
    #[serde(default)]
    pub build: BuildConfig,
    /// Artifact cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Core project metadata.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    pub version: String,
    /// A brief description.
    #[serde(default)]
    pub description: String,
    /// The entry module run by `zuri run` (e.g. `"app.main"`).
    #[serde(default)]
    pub main: Option<String>,
}

/// Source layout.
#[derive(Debug, Deserialize)]
pub struct SourcesConfig {
    /// Directories searched for modules, relative to the workspace root.
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,
    /// File extension of module sources, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            extension: default_extension(),
        }
    }
}

fn default_roots() -> Vec<String> {
    vec!["src".to_string()]
}

fn default_extension() -> String {
    "zr".to_string()
}

/// Compilation settings.
#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    /// Worker threads for graph builds; 0 means one per core.
    #[serde(default)]
    pub jobs: usize,
    /// Fold constant expressions after lowering.
    #[serde(default)]
    pub optimize: bool,
    /// How long to wait on another caller's in-flight build.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: HumanDuration,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            optimize: false,
            wait_timeout: default_wait_timeout(),
        }
    }
}

fn default_wait_timeout() -> HumanDuration {
    HumanDuration::from_millis(30_000)
}

/// Artifact cache settings.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Cache directory, relative to the workspace root.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Size budget enforced by `zuri cache evict` and after builds.
    #[serde(default = "default_max_size")]
    pub max_size: ByteSize,
    /// Entries older than this are evicted.
    #[serde(default = "default_max_age")]
    pub max_age: HumanDuration,
    /// Timeout for a single store operation.
    #[serde(default = "default_io_timeout")]
    pub io_timeout: HumanDuration,
    /// Retry behaviour for transient store failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_size: default_max_size(),
            max_age: default_max_age(),
            io_timeout: default_io_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_cache_dir() -> String {
    ".zuri/cache".to_string()
}

fn default_max_size() -> ByteSize {
    ByteSize::mib(256)
}

fn default_max_age() -> HumanDuration {
    HumanDuration::from_days(30)
}

fn default_io_timeout() -> HumanDuration {
    HumanDuration::from_millis(5_000)
}

/// Bounded exponential backoff for transient store errors.
#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: HumanDuration,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_backoff")]
    pub max_backoff: HumanDuration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> HumanDuration {
    HumanDuration::from_millis(10)
}

fn default_max_backoff() -> HumanDuration {
    HumanDuration::from_millis(200)
}

/// Logging settings.
#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// Default log level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warn,
    /// Build summaries.
    #[default]
    Info,
    /// Cache traffic and state transitions.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// The directive string understood by `tracing` filters.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
