//! Resolution of module ids to source units.

use crate::module_id::ModuleId;
use crate::source_unit::{check_source_len, SourceTooLarge, SourceUnit};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Errors produced when a module cannot be resolved.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No source exists for the module.
    #[error("module '{module}' not found")]
    NotFound {
        /// The module that was requested.
        module: ModuleId,
        /// The locations that were searched.
        searched: Vec<PathBuf>,
    },

    /// The source exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The source is too long to be addressed by spans.
    #[error(transparent)]
    TooLarge(#[from] SourceTooLarge),
}

/// Supplies source text for module ids.
///
/// Implementations must be safe to call from several build threads.
pub trait SourceProvider: Send + Sync {
    /// Returns the source unit for `module`.
    fn resolve(&self, module: &ModuleId) -> Result<SourceUnit, ResolveError>;
}

/// Resolves modules to files below a list of source roots.
///
/// `app.main` resolves to `<root>/app/main.<ext>` under the first root
/// that contains it.
#[derive(Debug, Clone)]
pub struct FsSourceProvider {
    roots: Vec<PathBuf>,
    extension: String,
}

impl FsSourceProvider {
    /// Creates a provider searching `roots` in order for files with `extension`.
    pub fn new(roots: Vec<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            roots,
            extension: extension.into(),
        }
    }

    /// The roots searched, in priority order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl SourceProvider for FsSourceProvider {
    fn resolve(&self, module: &ModuleId) -> Result<SourceUnit, ResolveError> {
        let relative = module.relative_path(&self.extension);
        let mut searched = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            let path = root.join(&relative);
            if path.is_file() {
                let io = |source| ResolveError::Io {
                    path: path.clone(),
                    source,
                };
                let len = std::fs::metadata(&path).map_err(io)?.len();
                check_source_len(&path, len)?;
                let text = std::fs::read_to_string(&path).map_err(io)?;
                return Ok(SourceUnit::new(module.clone(), path, text)?);
            }
            searched.push(path);
        }
        Err(ResolveError::NotFound {
            module: module.clone(),
            searched,
        })
    }
}

/// An in-memory provider for tests and REPL sessions.
#[derive(Debug, Default)]
pub struct MemorySourceProvider {
    sources: RwLock<BTreeMap<ModuleId, String>>,
}

impl MemorySourceProvider {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the source for `module`.
    pub fn insert(&self, module: ModuleId, text: impl Into<String>) {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        sources.insert(module, text.into());
    }

    /// Removes the source for `module`, returning whether it existed.
    pub fn remove(&self, module: &ModuleId) -> bool {
        let mut sources = self.sources.write().unwrap_or_else(|e| e.into_inner());
        sources.remove(module).is_some()
    }
}

impl SourceProvider for MemorySourceProvider {
    fn resolve(&self, module: &ModuleId) -> Result<SourceUnit, ResolveError> {
        let sources = self.sources.read().unwrap_or_else(|e| e.into_inner());
        match sources.get(module) {
            Some(text) => Ok(SourceUnit::new(
                module.clone(),
                format!("<memory>/{}", module.relative_path("zr").display()),
                text.as_str(),
            )?),
            None => Err(ResolveError::NotFound {
                module: module.clone(),
                searched: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::parse(s).unwrap()
    }

    #[test]
    fn memory_provider_resolves_inserted() {
        let provider = MemorySourceProvider::new();
        provider.insert(id("app.main"), "let x = 1");
        let unit = provider.resolve(&id("app.main")).unwrap();
        assert_eq!(unit.text(), "let x = 1");
        assert_eq!(unit.module(), &id("app.main"));
    }

    #[test]
    fn memory_provider_not_found() {
        let provider = MemorySourceProvider::new();
        let err = provider.resolve(&id("nope")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(err.to_string(), "module 'nope' not found");
    }

    #[test]
    fn memory_provider_remove() {
        let provider = MemorySourceProvider::new();
        provider.insert(id("a"), "");
        assert!(provider.remove(&id("a")));
        assert!(!provider.remove(&id("a")));
    }

    #[test]
    fn fs_provider_searches_roots_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::create_dir_all(second.join("math")).unwrap();
        std::fs::create_dir_all(&first).unwrap();
        std::fs::write(second.join("math").join("vec.zr"), "let one = 1").unwrap();

        let provider = FsSourceProvider::new(vec![first, second.clone()], "zr");
        let unit = provider.resolve(&id("math.vec")).unwrap();
        assert_eq!(unit.text(), "let one = 1");
        assert_eq!(unit.path(), second.join("math").join("vec.zr"));
    }

    #[test]
    fn fs_provider_reports_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FsSourceProvider::new(vec![dir.path().to_path_buf()], "zr");
        match provider.resolve(&id("missing")) {
            Err(ResolveError::NotFound { searched, .. }) => {
                assert_eq!(searched, vec![dir.path().join("missing.zr")]);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn fs_provider_rejects_oversized_files_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.zr");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(u64::from(u32::MAX) + 1).unwrap();
        let provider = FsSourceProvider::new(vec![dir.path().to_path_buf()], "zr");
        match provider.resolve(&id("huge")) {
            Err(ResolveError::TooLarge(err)) => {
                assert_eq!(err.path, path);
                assert_eq!(err.len, u64::from(u32::MAX) + 1);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }
}
