//! Shared pipeline helpers for CLI commands.
//!
//! Contains what `build`, `run`, `shell` and `cache` have in common:
//! project root resolution, configuration loading, logging setup, opening
//! the on-disk cache, creating the compiler, module discovery and
//! diagnostic rendering.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use zuri_build::{Compiler, CompilerOptions};
use zuri_cache::{ArtifactCache, CacheOptions, DiskStore, RetryPolicy};
use zuri_common::COMPILER_VERSION;
use zuri_config::{LogLevel, Settings, CONFIG_FILE_NAME};
use zuri_diagnostics::{Diagnostic, DiagnosticRenderer, TerminalRenderer};
use zuri_source::{FsSourceProvider, ModuleId, SourceDb};

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `zuri.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `zuri.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// Finds the project, loads its configuration and installs logging.
pub fn load_workspace(global: &GlobalArgs) -> Result<Settings, Box<dyn std::error::Error>> {
    let root = resolve_project_root(global)?;
    let config = zuri_config::load_config(&root)?;
    let settings = zuri_config::resolve_settings(&config, &root)?;
    init_tracing(global, Some(settings.log_level));
    tracing::debug!(root = %root.display(), project = %settings.project_name, "workspace loaded");
    Ok(settings)
}

/// The default log directive: `-v` and `-q` win over the configured level.
pub fn default_level(global: &GlobalArgs, configured: Option<LogLevel>) -> &'static str {
    if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        configured.unwrap_or(LogLevel::Warn).as_str()
    }
}

/// Installs the stderr subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing(global: &GlobalArgs, configured: Option<LogLevel>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(global, configured)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(global.color)
        .with_target(false)
        .try_init();
}

/// Opens the on-disk cache described by `settings`.
pub fn open_cache(settings: &Settings) -> Result<Arc<ArtifactCache>, Box<dyn std::error::Error>> {
    let store = DiskStore::open(&settings.cache.dir, settings.cache.io_timeout)?;
    let options = CacheOptions {
        compiler_version: COMPILER_VERSION.to_string(),
        wait_timeout: settings.wait_timeout,
        retry: RetryPolicy {
            attempts: settings.cache.retry.attempts,
            initial_backoff: settings.cache.retry.initial_backoff,
            max_backoff: settings.cache.retry.max_backoff,
        },
    };
    Ok(Arc::new(ArtifactCache::open(Arc::new(store), options)?))
}

/// Flushes the cache once no compiler holds it any more.
pub fn close_cache(cache: Arc<ArtifactCache>) {
    match Arc::try_unwrap(cache) {
        Ok(cache) => {
            if let Err(err) = cache.close() {
                tracing::warn!(error = %err, "failed to flush the cache");
            }
        }
        Err(_) => tracing::debug!("cache still shared, skipping flush"),
    }
}

/// Creates a compiler reading the project's source roots.
pub fn create_compiler(settings: &Settings, cache: Arc<ArtifactCache>, options: CompilerOptions) -> Compiler {
    let provider = FsSourceProvider::new(settings.source_roots.clone(), settings.extension.clone());
    Compiler::new(Arc::new(provider), cache, options)
}

/// Compiler options from the configuration.
pub fn compiler_options(settings: &Settings) -> CompilerOptions {
    CompilerOptions {
        optimize: settings.optimize,
        jobs: settings.jobs,
        ..CompilerOptions::default()
    }
}

/// The module named on the command line, or `project.main`.
pub fn entry_module(
    requested: Option<&str>,
    settings: &Settings,
) -> Result<ModuleId, Box<dyn std::error::Error>> {
    let name = requested
        .or(settings.main.as_deref())
        .ok_or("no module given and project.main is not set")?;
    Ok(ModuleId::parse(name)?)
}

/// Every module under the source roots, sorted by id. Files whose path is
/// not a valid module id are skipped.
pub fn discover_modules(settings: &Settings) -> Result<Vec<ModuleId>, Box<dyn std::error::Error>> {
    let mut modules = Vec::new();
    for root in &settings.source_roots {
        if root.is_dir() {
            walk_dir(root, root, &settings.extension, &mut modules)?;
        }
    }
    modules.sort();
    modules.dedup();
    Ok(modules)
}

fn walk_dir(
    root: &Path,
    dir: &Path,
    extension: &str,
    modules: &mut Vec<ModuleId>,
) -> Result<(), Box<dyn std::error::Error>> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(root, &path, extension, modules)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            match module_for_path(root, &path) {
                Some(module) => modules.push(module),
                None => tracing::warn!(path = %path.display(), "skipping file with invalid module name"),
            }
        }
    }
    Ok(())
}

/// The module id of `path` relative to `root`, e.g. `src/app/main.zr` → `app.main`.
pub fn module_for_path(root: &Path, path: &Path) -> Option<ModuleId> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let segments: Option<Vec<&str>> = relative.iter().map(|s| s.to_str()).collect();
    ModuleId::from_segments(&segments?).ok()
}

/// Renders one diagnostic to stderr.
pub fn render_diagnostic(diag: &Diagnostic, sources: &SourceDb, color: bool) {
    eprint!("{}", TerminalRenderer::new(color).render(diag, sources));
}
