//! Conformance test helpers for the Zuri toolchain.
//!
//! [`TestWorkspace`] bundles an in-memory source provider, an in-memory
//! store and the cache on top of it, so integration tests can compile,
//! edit and recompile modules and then look at what reached the store.
//! [`DiskWorkspace`] does the same on a real directory with a
//! [`DiskStore`].

#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use zuri_build::{CompileError, Compiler, CompilerOptions};
use zuri_cache::{ArtifactCache, CacheOptions, DiskStore, MemoryStore, RetryPolicy};
use zuri_runtime::Runtime;
use zuri_source::{FsSourceProvider, MemorySourceProvider, ModuleId};

/// Parses a module id, panicking on invalid input.
pub fn id(name: &str) -> ModuleId {
    ModuleId::parse(name).unwrap_or_else(|e| panic!("invalid module id '{name}': {e}"))
}

/// Cache options for tests: short waits and no retry sleeps.
pub fn test_cache_options() -> CacheOptions {
    CacheOptions {
        wait_timeout: Duration::from_secs(10),
        retry: RetryPolicy::none(),
        ..CacheOptions::default()
    }
}

/// Sources, store and cache kept in memory.
pub struct TestWorkspace {
    /// The source provider shared by every compiler of the workspace.
    pub provider: Arc<MemorySourceProvider>,
    /// The store under the cache.
    pub store: Arc<MemoryStore>,
    /// The cache shared by every compiler of the workspace.
    pub cache: Arc<ArtifactCache>,
}

impl TestWorkspace {
    /// Creates a workspace holding `files` as `(module id, source)` pairs.
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::with_cache_options(files, test_cache_options())
    }

    /// Like [`new`](Self::new) with explicit cache options.
    pub fn with_cache_options(files: &[(&str, &str)], options: CacheOptions) -> Self {
        let provider = Arc::new(MemorySourceProvider::new());
        for (name, text) in files {
            provider.insert(id(name), *text);
        }
        let store = Arc::new(MemoryStore::new());
        let cache = ArtifactCache::open(store.clone(), options)
            .unwrap_or_else(|e| panic!("cannot open cache: {e}"));
        Self {
            provider,
            store,
            cache: Arc::new(cache),
        }
    }

    /// Replaces or adds a module's source.
    pub fn set_source(&self, name: &str, text: &str) {
        self.provider.insert(id(name), text);
    }

    /// A fresh compiler with default options. Compilers share nothing but
    /// the provider and the cache.
    pub fn compiler(&self) -> Compiler {
        self.compiler_with(CompilerOptions::default())
    }

    /// A fresh compiler with `options`.
    pub fn compiler_with(&self, options: CompilerOptions) -> Compiler {
        Compiler::new(self.provider.clone(), self.cache.clone(), options)
    }

    /// Compiles `name` with a fresh compiler.
    pub fn compile(&self, name: &str) -> Result<zuri_build::CompiledModule, CompileError> {
        self.compiler().compile(&id(name))
    }

    /// Compiles and runs `name`, returning the captured `print` output.
    pub fn run_output(&self, name: &str) -> Result<Vec<String>, zuri_build::RunError> {
        let mut runtime = Runtime::new();
        self.compiler().run(&id(name), &mut runtime)?;
        Ok(runtime.take_output())
    }

    /// Number of keys in the store.
    pub fn stored_keys(&self) -> usize {
        self.store.len()
    }
}

/// A project directory compiled with a [`DiskStore`] cache.
pub struct DiskWorkspace {
    root: PathBuf,
}

impl DiskWorkspace {
    /// Writes `files` as `(module id, source)` pairs under `<root>/src`.
    pub fn create(root: &Path, files: &[(&str, &str)]) -> std::io::Result<Self> {
        for (name, text) in files {
            let path = root.join("src").join(id(name).relative_path("zr"));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, text)?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// The cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(".zuri").join("cache")
    }

    /// Opens the store and returns a compiler on top of it. The directory
    /// lock is held until the compiler and the returned cache are dropped.
    pub fn open(&self) -> Result<(Compiler, Arc<ArtifactCache>), Box<dyn std::error::Error>> {
        let store = DiskStore::open(&self.cache_dir(), Duration::from_secs(5))?;
        let cache = Arc::new(ArtifactCache::open(Arc::new(store), test_cache_options())?);
        let provider = FsSourceProvider::new(vec![self.root.join("src")], "zr");
        let compiler = Compiler::new(Arc::new(provider), cache.clone(), CompilerOptions::default());
        Ok((compiler, cache))
    }
}
