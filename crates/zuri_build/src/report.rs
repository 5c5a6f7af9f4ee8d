//! Results of compilation requests.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use zuri_common::{Fingerprint, InternalError};
use zuri_ir::IrModule;
use zuri_source::ModuleId;

use crate::error::CompileError;
use crate::state::BuildTrace;

/// How a request obtained its IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    /// Read from the cache.
    Cached,
    /// Compiled by this request.
    Built,
    /// Received from a concurrent request for the same fingerprint.
    Shared,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Cached => "cached",
            Origin::Built => "built",
            Origin::Shared => "shared",
        })
    }
}

/// A successfully compiled module.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    /// The module id.
    pub module: ModuleId,
    /// The build fingerprint.
    pub fingerprint: Fingerprint,
    /// The IR.
    pub ir: Arc<IrModule>,
    /// Where the IR came from.
    pub origin: Origin,
    /// States the request went through.
    pub trace: BuildTrace,
}

/// A module together with everything it depends on, dependencies first.
#[derive(Debug, Clone)]
pub struct Program {
    /// Compiled modules; the requested module is last.
    pub modules: Vec<CompiledModule>,
}

impl Program {
    /// The requested module.
    pub fn root(&self) -> Option<&CompiledModule> {
        self.modules.last()
    }

    /// Consumes the program and returns the requested module.
    pub fn into_root(mut self) -> Result<CompiledModule, CompileError> {
        self.modules
            .pop()
            .ok_or_else(|| InternalError::new("compiled program is empty").into())
    }
}

/// Per-module outcome in a [`BuildReport`].
#[derive(Debug, Clone)]
pub struct ModuleReport {
    /// The module.
    pub module: ModuleId,
    /// The compiled module, or why it failed.
    pub outcome: Result<CompiledModule, CompileError>,
}

/// Summary of a graph build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Outcomes in build order.
    pub modules: Vec<ModuleReport>,
    /// Wall-clock time of the build.
    pub elapsed: Duration,
}

impl BuildReport {
    /// A report for a build that failed before any module was attempted.
    pub fn failed_early(roots: &[ModuleId], error: CompileError, elapsed: Duration) -> Self {
        Self {
            modules: roots
                .iter()
                .map(|root| ModuleReport {
                    module: root.clone(),
                    outcome: Err(error.clone()),
                })
                .collect(),
            elapsed,
        }
    }

    fn count(&self, origin: Origin) -> usize {
        self.modules
            .iter()
            .filter(|m| matches!(&m.outcome, Ok(c) if c.origin == origin))
            .count()
    }

    /// Modules read from the cache.
    pub fn hits(&self) -> usize {
        self.count(Origin::Cached)
    }

    /// Modules compiled by this build.
    pub fn builds(&self) -> usize {
        self.count(Origin::Built)
    }

    /// Modules received from concurrent builds.
    pub fn shared(&self) -> usize {
        self.count(Origin::Shared)
    }

    /// Errors of failed modules, in build order.
    pub fn failures(&self) -> Vec<&CompileError> {
        self.modules
            .iter()
            .filter_map(|m| m.outcome.as_ref().err())
            .collect()
    }

    /// Whether every module compiled.
    pub fn is_success(&self) -> bool {
        self.modules.iter().all(|m| m.outcome.is_ok())
    }

    /// The outcome for `module`.
    pub fn get(&self, module: &ModuleId) -> Option<&Result<CompiledModule, CompileError>> {
        self.modules
            .iter()
            .find(|m| &m.module == module)
            .map(|m| &m.outcome)
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} module(s): {} cached, {} built",
            self.modules.len(),
            self.hits(),
            self.builds()
        )?;
        if self.shared() > 0 {
            write!(f, ", {} shared", self.shared())?;
        }
        let failed = self.failures().len();
        if failed > 0 {
            write!(f, ", {failed} failed")?;
        }
        write!(f, " in {:.2}s", self.elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BuildState;

    fn compiled(name: &str, origin: Origin) -> ModuleReport {
        let module = ModuleId::parse(name).unwrap();
        let mut trace = BuildTrace::new(module.clone());
        trace.advance(BuildState::FingerprintComputed).unwrap();
        ModuleReport {
            module: module.clone(),
            outcome: Ok(CompiledModule {
                module: module.clone(),
                fingerprint: Fingerprint::from_raw([0; 16]),
                ir: Arc::new(IrModule::new(name)),
                origin,
                trace,
            }),
        }
    }

    #[test]
    fn counts_and_summary() {
        let failed = ModuleReport {
            module: ModuleId::parse("c").unwrap(),
            outcome: Err(CompileError::Cancelled {
                module: ModuleId::parse("c").unwrap(),
            }),
        };
        let report = BuildReport {
            modules: vec![compiled("a", Origin::Cached), compiled("b", Origin::Built), failed],
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!((report.hits(), report.builds(), report.shared()), (1, 1, 0));
        assert!(!report.is_success());
        assert_eq!(report.failures().len(), 1);
        assert_eq!(
            report.to_string(),
            "3 module(s): 1 cached, 1 built, 1 failed in 1.50s"
        );
        assert!(report.get(&ModuleId::parse("a").unwrap()).unwrap().is_ok());
    }

    #[test]
    fn early_failure_marks_every_root() {
        let roots = [ModuleId::parse("x").unwrap(), ModuleId::parse("y").unwrap()];
        let err = CompileError::Cancelled {
            module: roots[0].clone(),
        };
        let report = BuildReport::failed_early(&roots, err, Duration::ZERO);
        assert_eq!(report.failures().len(), 2);
    }
}
