//! The compilation orchestrator.
//!
//! A request discovers the import graph, fingerprints each module from its
//! source and its dependencies' fingerprints, and then either reads the IR
//! from the cache or builds it. Builds for one fingerprint are shared
//! between concurrent requests through
//! [`ArtifactCache::get_or_build`], so at most one parse, lower and insert
//! runs per fingerprint at a time.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use rayon::prelude::*;
use zuri_cache::{ArtifactCache, CacheError, Role};
use zuri_common::{CancellationToken, Fingerprint, InternalError, Interner, COMPILER_VERSION};
use zuri_diagnostics::{DiagnosticRenderer, TerminalRenderer};
use zuri_ir::{IrModule, CURRENT_SCHEMA_VERSION};
use zuri_lower::{DependencyInterface, LowerContext, Session};
use zuri_runtime::{CompiledUnit, FragmentCompiler, FragmentError, Runtime, RuntimeError};
use zuri_source::{FileId, ModuleId, SourceDb, SourceProvider, SourceUnit};

use crate::error::CompileError;
use crate::fingerprint::{fragment_fingerprint, module_fingerprint, FingerprintInputs};
use crate::graph::{DependencyGraph, ModuleSource};
use crate::report::{BuildReport, CompiledModule, ModuleReport, Origin, Program};
use crate::state::{BuildState, BuildTrace};

/// Options of a [`Compiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Fold constant operations after lowering.
    pub optimize: bool,
    /// Worker threads for [`Compiler::compile_all`]; 0 means one per core.
    pub jobs: usize,
    /// Newest IR schema version accepted from the cache. Entries written
    /// with a newer version are removed and rebuilt.
    pub max_schema_version: u16,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            optimize: false,
            jobs: 0,
            max_schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

/// Why [`Compiler::run`] failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
    /// The program did not compile.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The program failed while running.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl RunError {
    /// Converts the error into a diagnostic.
    pub fn to_diagnostic(&self) -> zuri_diagnostics::Diagnostic {
        match self {
            RunError::Compile(err) => err.to_diagnostic(),
            RunError::Runtime(err) => err.to_diagnostic(),
        }
    }
}

/// The value a build shares with every request for its fingerprint.
#[derive(Debug, Clone)]
struct Built {
    ir: Arc<IrModule>,
    cached: bool,
}

type Shared = Result<Built, CompileError>;

/// What one module build needs besides the graph.
struct Job<'a> {
    module: &'a ModuleId,
    file: FileId,
    text: &'a str,
    fingerprint: Fingerprint,
    dependencies: &'a [&'a CompiledModule],
    session: Option<&'a Session>,
}

/// Compiles modules through the cache.
pub struct Compiler {
    provider: Arc<dyn SourceProvider>,
    cache: Arc<ArtifactCache>,
    options: CompilerOptions,
    sources: SourceDb,
    interner: Interner,
    pool: OnceLock<Option<rayon::ThreadPool>>,
}

impl Compiler {
    /// Creates a compiler reading sources from `provider`.
    pub fn new(
        provider: Arc<dyn SourceProvider>,
        cache: Arc<ArtifactCache>,
        options: CompilerOptions,
    ) -> Self {
        Self {
            provider,
            cache,
            options,
            sources: SourceDb::new(),
            interner: Interner::new(),
            pool: OnceLock::new(),
        }
    }

    /// Every source unit read so far, for rendering diagnostics.
    pub fn sources(&self) -> &SourceDb {
        &self.sources
    }

    /// The cache.
    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// The options.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compiles `module` and its dependencies.
    pub fn compile(&self, module: &ModuleId) -> Result<CompiledModule, CompileError> {
        self.compile_with(module, &CancellationToken::new())
    }

    /// Like [`compile`](Self::compile), stopping at the next checkpoint
    /// once `cancel` fires.
    pub fn compile_with(
        &self,
        module: &ModuleId,
        cancel: &CancellationToken,
    ) -> Result<CompiledModule, CompileError> {
        self.compile_program(module, cancel)?.into_root()
    }

    /// Compiles `module` and returns it together with its dependencies,
    /// dependencies first.
    pub fn compile_program(
        &self,
        module: &ModuleId,
        cancel: &CancellationToken,
    ) -> Result<Program, CompileError> {
        let graph = DependencyGraph::discover(module, self.provider.as_ref(), &self.sources)?;
        self.build_closure(&graph, module, None, cancel)
    }

    /// Compiles every module reachable from `roots`. Modules of one graph
    /// level build in parallel. A failure only stops the modules that
    /// depend on the failed one.
    pub fn compile_all(&self, roots: &[ModuleId]) -> BuildReport {
        self.compile_all_with(roots, &CancellationToken::new())
    }

    /// Like [`compile_all`](Self::compile_all) with a cancellation token.
    pub fn compile_all_with(&self, roots: &[ModuleId], cancel: &CancellationToken) -> BuildReport {
        let start = Instant::now();
        let levels = DependencyGraph::discover_all(roots, self.provider.as_ref(), &self.sources)
            .and_then(|graph| graph.levels().map(|levels| (graph, levels)));
        let (graph, levels) = match levels {
            Ok(found) => found,
            Err(err) => {
                tracing::info!(roots = roots.len(), error = %err, "build failed during discovery");
                return BuildReport::failed_early(roots, err, start.elapsed());
            }
        };

        let mut done: HashMap<ModuleId, CompiledModule> = HashMap::new();
        let mut modules = Vec::with_capacity(graph.len());
        for level in &levels {
            let outcomes: Vec<(ModuleId, Result<CompiledModule, CompileError>)> =
                self.in_pool(|| {
                    level
                        .par_iter()
                        .map(|module| {
                            let outcome = self.build_module(&graph, module, &done, None, cancel);
                            (module.clone(), outcome)
                        })
                        .collect()
                });
            for (module, outcome) in outcomes {
                if let Ok(compiled) = &outcome {
                    done.insert(module.clone(), compiled.clone());
                }
                modules.push(ModuleReport { module, outcome });
            }
        }

        let report = BuildReport {
            modules,
            elapsed: start.elapsed(),
        };
        tracing::info!(
            modules = report.modules.len(),
            cached = report.hits(),
            built = report.builds(),
            shared = report.shared(),
            failed = report.failures().len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "build finished"
        );
        report
    }

    /// Compiles a shell fragment as module `fragment<index>` with the
    /// given session globals and namespaces visible. The modules behind
    /// the namespaces are dependencies of the fragment.
    pub fn compile_fragment_with(
        &self,
        index: usize,
        source: &str,
        session: &Session,
        cancel: &CancellationToken,
    ) -> Result<Program, CompileError> {
        let module = ModuleId::parse(&format!("fragment{index}"))
            .map_err(|err| InternalError::new(format!("bad fragment id: {err}")))?;
        let unit = SourceUnit::new(module.clone(), format!("<fragment{index}>"), source).map_err(
            |err| CompileError::Source {
                module: module.clone(),
                reason: err.to_string(),
            },
        )?;
        let graph = DependencyGraph::discover_unit(
            unit,
            &session.modules(),
            self.provider.as_ref(),
            &self.sources,
        )?;
        self.build_closure(&graph, &module, Some(session), cancel)
    }

    /// Compiles `module` and runs it and its dependencies in `runtime`,
    /// dependencies first.
    pub fn run(&self, module: &ModuleId, runtime: &mut Runtime) -> Result<Program, RunError> {
        let program = self.compile_program(module, &CancellationToken::new())?;
        for compiled in &program.modules {
            runtime.instantiate(compiled.fingerprint, compiled.ir.clone())?;
        }
        Ok(program)
    }

    /// Renders `error` the way the terminal shows it, without colors.
    pub fn render(&self, error: &CompileError) -> String {
        TerminalRenderer::new(false)
            .render(&error.to_diagnostic(), &self.sources)
            .trim_end()
            .to_string()
    }

    fn in_pool<R: Send>(&self, work: impl FnOnce() -> R + Send) -> R {
        let pool = self.pool.get_or_init(|| {
            if self.options.jobs == 0 {
                return None;
            }
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .thread_name(|i| format!("zuri-build-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    tracing::warn!(jobs = self.options.jobs, error = %err, "using the global thread pool");
                    None
                }
            }
        });
        match pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }

    fn build_closure(
        &self,
        graph: &DependencyGraph,
        root: &ModuleId,
        session: Option<&Session>,
        cancel: &CancellationToken,
    ) -> Result<Program, CompileError> {
        let mut done: HashMap<ModuleId, CompiledModule> = HashMap::new();
        let mut modules = Vec::new();
        for module in graph.closure(root)? {
            let session = if &module == root { session } else { None };
            let compiled = self.build_module(graph, &module, &done, session, cancel)?;
            done.insert(module, compiled.clone());
            modules.push(compiled);
        }
        Ok(Program { modules })
    }

    fn build_module(
        &self,
        graph: &DependencyGraph,
        module: &ModuleId,
        done: &HashMap<ModuleId, CompiledModule>,
        session: Option<&Session>,
        cancel: &CancellationToken,
    ) -> Result<CompiledModule, CompileError> {
        let (unit, file) = match graph.source(module) {
            Some(ModuleSource::Ready { unit, file, .. }) => (unit, *file),
            Some(ModuleSource::Failed(err)) => return Err(err.clone()),
            None => {
                return Err(InternalError::new(format!("module '{module}' is not in the graph")).into())
            }
        };
        let mut dependencies = Vec::new();
        for dependency in graph.dependencies(module) {
            match done.get(&dependency) {
                Some(compiled) => dependencies.push(compiled),
                None => {
                    return Err(CompileError::DependencyFailed {
                        module: module.clone(),
                        dependency,
                    })
                }
            }
        }

        let pairs: Vec<(ModuleId, Fingerprint)> = dependencies
            .iter()
            .map(|dep| (dep.module.clone(), dep.fingerprint))
            .collect();
        let inputs = FingerprintInputs {
            module,
            source: unit.text(),
            dependencies: &pairs,
            optimize: self.options.optimize,
        };
        let fingerprint = match session {
            Some(symbols) => fragment_fingerprint(&inputs, symbols),
            None => module_fingerprint(&inputs),
        };

        let mut trace = BuildTrace::new(module.clone());
        trace.advance(BuildState::FingerprintComputed)?;
        let job = Job {
            module,
            file,
            text: unit.text(),
            fingerprint,
            dependencies: &dependencies,
            session,
        };

        let _pin = self.cache.pin(fingerprint);
        let flight = self
            .cache
            .get_or_build(fingerprint, cancel, || self.lead(&job, &mut trace, cancel));
        let flight = match flight {
            Ok(flight) => flight,
            Err(err) => {
                trace.fail();
                return Err(CompileError::from_cache(module, err));
            }
        };

        let origin = match flight.role {
            Role::Leader => match &flight.value {
                Ok(built) if built.cached => Origin::Cached,
                _ => Origin::Built,
            },
            Role::Waiter => {
                match &flight.value {
                    Ok(_) => {
                        trace.advance(BuildState::CacheMiss)?;
                        trace.advance(BuildState::Done)?;
                    }
                    Err(_) => trace.fail(),
                }
                Origin::Shared
            }
        };
        let built = flight.value?;
        tracing::debug!(
            module = %module,
            fingerprint = %fingerprint.short(),
            origin = %origin,
            "module ready"
        );
        Ok(CompiledModule {
            module: module.clone(),
            fingerprint,
            ir: built.ir,
            origin,
            trace,
        })
    }

    /// Runs as the single-flight leader. `None` abandons the slot.
    fn lead(&self, job: &Job<'_>, trace: &mut BuildTrace, cancel: &CancellationToken) -> Option<Shared> {
        match self.try_cached(job, trace) {
            Ok(Some(ir)) => {
                return Some(Ok(Built {
                    ir: Arc::new(ir),
                    cached: true,
                }))
            }
            Ok(None) => {}
            Err(err) => {
                trace.fail();
                return Some(Err(err));
            }
        }
        match self.build_steps(job, trace, cancel) {
            Ok(Some(ir)) => Some(Ok(Built {
                ir: Arc::new(ir),
                cached: false,
            })),
            Ok(None) => {
                trace.fail();
                tracing::debug!(module = %job.module, "build cancelled");
                None
            }
            Err(err) => {
                trace.fail();
                Some(Err(err))
            }
        }
    }

    /// Reads the IR from the cache. Unreadable entries are removed and
    /// reported as a miss. On return the trace is in `Done` (hit) or
    /// `CacheMiss`.
    fn try_cached(&self, job: &Job<'_>, trace: &mut BuildTrace) -> Result<Option<IrModule>, CompileError> {
        let fp = job.fingerprint;
        let entry = match self.cache.lookup(fp) {
            Ok(entry) => entry,
            Err(CacheError::CorruptEntry { reason, .. }) => {
                tracing::warn!(module = %job.module, fingerprint = %fp.short(), %reason, "discarding unreadable cache entry");
                self.discard(job)?;
                None
            }
            Err(err) => return Err(CompileError::from_cache(job.module, err)),
        };
        let Some(entry) = entry else {
            trace.advance(BuildState::CacheMiss)?;
            return Ok(None);
        };

        trace.advance(BuildState::CacheHit)?;
        match zuri_ir::deserialize_compat(&entry.bytes, self.options.max_schema_version) {
            Ok(ir) => {
                trace.advance(BuildState::Done)?;
                Ok(Some(ir))
            }
            Err(err) => {
                tracing::warn!(
                    module = %job.module,
                    fingerprint = %fp.short(),
                    error = %err,
                    "cached IR rejected, rebuilding"
                );
                self.discard(job)?;
                trace.advance(BuildState::CacheMiss)?;
                Ok(None)
            }
        }
    }

    fn discard(&self, job: &Job<'_>) -> Result<(), CompileError> {
        self.cache
            .remove(job.fingerprint)
            .map(|_| ())
            .map_err(|err| CompileError::from_cache(job.module, err))
    }

    /// Parses, lowers, serializes and inserts. `Ok(None)` means the
    /// request was cancelled at a checkpoint.
    fn build_steps(
        &self,
        job: &Job<'_>,
        trace: &mut BuildTrace,
        cancel: &CancellationToken,
    ) -> Result<Option<IrModule>, CompileError> {
        let module = job.module;

        trace.advance(BuildState::Parsing)?;
        let tree = zuri_syntax::parse(job.text, job.file, &self.interner).map_err(|error| {
            CompileError::Syntax {
                module: module.clone(),
                error,
            }
        })?;
        if cancel.is_cancelled() {
            return Ok(None);
        }

        trace.advance(BuildState::Lowering)?;
        let dependencies = job
            .dependencies
            .iter()
            .map(|dep| DependencyInterface {
                module: dep.module.clone(),
                fingerprint: dep.fingerprint,
                ir: dep.ir.clone(),
            })
            .collect();
        let ctx = LowerContext::new(module.clone(), &self.interner)
            .with_dependencies(dependencies)
            .with_session(job.session.cloned().unwrap_or_default());
        let mut ir = zuri_lower::lower(&tree, &ctx).map_err(|error| CompileError::Semantic {
            module: module.clone(),
            error,
        })?;
        if self.options.optimize {
            let folded = zuri_ir::fold_constants(&mut ir);
            tracing::debug!(module = %module, folded, "constant folding");
        }
        if cancel.is_cancelled() {
            return Ok(None);
        }

        trace.advance(BuildState::Serializing)?;
        let bytes = zuri_ir::serialize(&ir).map_err(|error| CompileError::Schema {
            module: module.clone(),
            error,
        })?;
        if cancel.is_cancelled() {
            return Ok(None);
        }

        trace.advance(BuildState::CacheInsert)?;
        let outcome = self
            .cache
            .insert(job.fingerprint, &bytes, COMPILER_VERSION)
            .map_err(|err| CompileError::from_cache(module, err))?;
        tracing::debug!(
            module = %module,
            fingerprint = %job.fingerprint.short(),
            size = bytes.len(),
            outcome = ?outcome,
            "module built"
        );
        trace.advance(BuildState::Done)?;
        Ok(Some(ir))
    }
}

impl FragmentCompiler for Compiler {
    fn compile_fragment(
        &self,
        index: usize,
        source: &str,
        session: &Session,
    ) -> Result<Vec<CompiledUnit>, FragmentError> {
        match self.compile_fragment_with(index, source, session, &CancellationToken::new()) {
            Ok(program) => Ok(program
                .modules
                .into_iter()
                .map(|compiled| CompiledUnit {
                    fingerprint: compiled.fingerprint,
                    ir: compiled.ir,
                })
                .collect()),
            Err(err) if err.is_incomplete() => Err(FragmentError::Incomplete),
            Err(err @ CompileError::Syntax { .. }) => Err(FragmentError::Syntax(self.render(&err))),
            Err(err) => Err(FragmentError::Build(self.render(&err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use zuri_cache::{CacheOptions, MemoryStore};
    use zuri_lower::{SessionImport, SessionSymbol};
    use zuri_source::MemorySourceProvider;

    struct Fixture {
        provider: Arc<MemorySourceProvider>,
        store: Arc<MemoryStore>,
        cache: Arc<ArtifactCache>,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let provider = Arc::new(MemorySourceProvider::new());
            for (name, text) in files {
                provider.insert(id(name), *text);
            }
            let store = Arc::new(MemoryStore::new());
            let cache = Arc::new(ArtifactCache::open(store.clone(), CacheOptions::default()).unwrap());
            Self {
                provider,
                store,
                cache,
            }
        }

        fn compiler(&self, options: CompilerOptions) -> Compiler {
            Compiler::new(self.provider.clone(), self.cache.clone(), options)
        }
    }

    fn id(s: &str) -> ModuleId {
        ModuleId::parse(s).unwrap()
    }

    #[test]
    fn second_compile_hits_the_cache() {
        let fx = Fixture::new(&[("app", "let x = 1 + 2\nprint(x)")]);
        let first = fx.compiler(CompilerOptions::default()).compile(&id("app")).unwrap();
        assert_eq!(first.origin, Origin::Built);
        assert_eq!(
            first.trace.states(),
            [
                BuildState::Pending,
                BuildState::FingerprintComputed,
                BuildState::CacheMiss,
                BuildState::Parsing,
                BuildState::Lowering,
                BuildState::Serializing,
                BuildState::CacheInsert,
                BuildState::Done,
            ]
        );

        let second = fx.compiler(CompilerOptions::default()).compile(&id("app")).unwrap();
        assert_eq!(second.origin, Origin::Cached);
        assert_eq!(second.fingerprint, first.fingerprint);
        assert_eq!(*second.ir, *first.ir);
        assert!(!second.trace.visited(BuildState::Parsing));
        assert_eq!(fx.cache.stats().inserts, 1);
    }

    #[test]
    fn dependency_change_changes_importer_fingerprint() {
        let fx = Fixture::new(&[("lib", "let a = 1"), ("app", "import lib\nprint(lib.a)")]);
        let before = fx.compiler(CompilerOptions::default()).compile(&id("app")).unwrap();
        fx.provider.insert(id("lib"), "let a = 2");
        let after = fx.compiler(CompilerOptions::default()).compile(&id("app")).unwrap();
        assert_ne!(before.fingerprint, after.fingerprint);
        assert_eq!(after.origin, Origin::Built);
    }

    #[test]
    fn syntax_error_is_not_cached() {
        let fx = Fixture::new(&[("bad", "let = 3")]);
        let err = fx.compiler(CompilerOptions::default()).compile(&id("bad")).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
        assert_eq!(fx.store.write_count(), 0);
    }

    #[test]
    fn semantic_error_fails_after_lowering() {
        let fx = Fixture::new(&[("bad", "print(missing)")]);
        let err = fx.compiler(CompilerOptions::default()).compile(&id("bad")).unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
        assert_eq!(fx.cache.stats().inserts, 0);
    }

    #[test]
    fn cycle_fails_before_any_write() {
        let fx = Fixture::new(&[("a", "import b"), ("b", "import a")]);
        let err = fx.compiler(CompilerOptions::default()).compile(&id("a")).unwrap_err();
        match err {
            CompileError::DependencyCycle(cycle) => assert_eq!(cycle.members, vec![id("a"), id("b")]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fx.store.write_count(), 0);
    }

    #[test]
    fn newer_schema_is_rebuilt() {
        let fx = Fixture::new(&[("app", "let x = 1")]);
        let first = fx.compiler(CompilerOptions::default()).compile(&id("app")).unwrap();
        let strict = CompilerOptions {
            max_schema_version: 0,
            ..CompilerOptions::default()
        };
        let again = fx.compiler(strict).compile(&id("app")).unwrap();
        assert_eq!(again.fingerprint, first.fingerprint);
        assert_eq!(again.origin, Origin::Built);
        assert_eq!(
            &again.trace.states()[..4],
            [
                BuildState::Pending,
                BuildState::FingerprintComputed,
                BuildState::CacheHit,
                BuildState::CacheMiss,
            ]
        );
    }

    #[test]
    fn tampered_entry_is_rebuilt() {
        let fx = Fixture::new(&[("app", "let x = 1")]);
        let first = fx.compiler(CompilerOptions::default()).compile(&id("app")).unwrap();
        let key = format!("{}{}", zuri_cache::entry::ARTIFACT_PREFIX, first.fingerprint);
        fx.store.tamper(key.as_bytes(), b"garbage");
        let again = fx.compiler(CompilerOptions::default()).compile(&id("app")).unwrap();
        assert_eq!(again.origin, Origin::Built);
        assert_eq!(*again.ir, *first.ir);
    }

    #[test]
    fn optimize_folds_and_changes_fingerprint() {
        let fx = Fixture::new(&[("app", "let x = 1 + 2")]);
        let plain = fx.compiler(CompilerOptions::default()).compile(&id("app")).unwrap();
        let optimized = fx
            .compiler(CompilerOptions {
                optimize: true,
                ..CompilerOptions::default()
            })
            .compile(&id("app"))
            .unwrap();
        assert_ne!(plain.fingerprint, optimized.fingerprint);
        assert_eq!(zuri_ir::foldable_operations(&plain.ir), 1);
        assert_eq!(zuri_ir::foldable_operations(&optimized.ir), 0);
    }

    #[test]
    fn cancelled_request_reports_cancellation() {
        let fx = Fixture::new(&[("app", "let x = 1")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fx
            .compiler(CompilerOptions::default())
            .compile_with(&id("app"), &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fx.store.write_count(), 0);
    }

    #[test]
    fn compile_all_isolates_failures() {
        let fx = Fixture::new(&[
            ("good", "let g = 1"),
            ("bad", "let = 1"),
            ("user", "import bad\nprint(1)"),
            ("other", "import good\nprint(good.g)"),
        ]);
        let compiler = fx.compiler(CompilerOptions {
            jobs: 2,
            ..CompilerOptions::default()
        });
        let report = compiler.compile_all(&[id("user"), id("other")]);
        assert!(!report.is_success());
        assert!(report.get(&id("other")).unwrap().is_ok());
        assert!(matches!(
            report.get(&id("user")),
            Some(Err(CompileError::DependencyFailed { .. }))
        ));
        assert!(matches!(
            report.get(&id("bad")),
            Some(Err(CompileError::Syntax { .. }))
        ));
        assert_eq!(report.builds(), 2);
    }

    #[test]
    fn concurrent_requests_build_once() {
        let fx = Fixture::new(&[("app", "def f(n: Int) -> Int { return n * 2 }\nprint(f(21))")]);
        let compiler = fx.compiler(CompilerOptions::default());
        let barrier = Barrier::new(4);
        let results: Vec<CompiledModule> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        compiler.compile(&id("app")).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let parsed = results
            .iter()
            .filter(|c| c.trace.visited(BuildState::Parsing))
            .count();
        assert_eq!(parsed, 1);
        assert_eq!(fx.cache.stats().inserts, 1);
        assert!(results.iter().all(|c| c.fingerprint == results[0].fingerprint));
    }

    #[test]
    fn run_executes_dependencies_first() {
        let fx = Fixture::new(&[
            ("lib", "print(\"lib\")\nlet n = 20"),
            ("app", "import lib\nprint(lib.n + 1)"),
        ]);
        let mut runtime = Runtime::new();
        let program = fx
            .compiler(CompilerOptions::default())
            .run(&id("app"), &mut runtime)
            .unwrap();
        assert_eq!(program.modules.len(), 2);
        assert_eq!(runtime.take_output(), ["lib", "21"]);
    }

    #[test]
    fn run_reports_runtime_errors() {
        let fx = Fixture::new(&[("app", "let z = 0\nprint(1 / z)")]);
        let err = fx
            .compiler(CompilerOptions::default())
            .run(&id("app"), &mut Runtime::new())
            .unwrap_err();
        assert!(matches!(err, RunError::Runtime(_)));
    }

    #[test]
    fn fragments_see_session_and_classify_errors() {
        let fx = Fixture::new(&[]);
        let compiler = fx.compiler(CompilerOptions::default());
        let session = Session {
            globals: vec![SessionSymbol {
                name: "n".to_string(),
                mutable: true,
            }],
            imports: vec![],
        };
        let units = compiler.compile_fragment(2, "n = n + 1", &session).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].ir.name, "fragment2");

        assert_eq!(
            compiler.compile_fragment(3, "def f() {", &Session::default()).unwrap_err(),
            FragmentError::Incomplete
        );
        assert!(matches!(
            compiler.compile_fragment(3, "let = 1", &Session::default()),
            Err(FragmentError::Syntax(_))
        ));
        assert!(matches!(
            compiler.compile_fragment(3, "print(nope)", &Session::default()),
            Err(FragmentError::Build(_))
        ));
    }

    #[test]
    fn fragments_depend_on_session_namespaces() {
        let fx = Fixture::new(&[("util", "def twice(n: Int) -> Int { return n * 2 }")]);
        let compiler = fx.compiler(CompilerOptions::default());
        let first = compiler
            .compile_fragment(1, "import util", &Session::default())
            .unwrap();
        let util = first.iter().find(|unit| unit.ir.name == "util").unwrap();
        let session = Session {
            globals: vec![],
            imports: vec![SessionImport {
                alias: "util".to_string(),
                module: id("util"),
                fingerprint: util.fingerprint,
            }],
        };

        let units = compiler
            .compile_fragment(2, "print(util.twice(4))", &session)
            .unwrap();
        let names: Vec<_> = units.iter().map(|unit| unit.ir.name.as_str()).collect();
        assert_eq!(names, ["util", "fragment2"]);
        let (_, import) = units[1].ir.imports.iter().next().unwrap();
        assert_eq!(import.fingerprint, util.fingerprint);

        assert!(matches!(
            compiler.compile_fragment(3, "print(util.twice(4))", &Session::default()),
            Err(FragmentError::Build(_))
        ));
    }
}
