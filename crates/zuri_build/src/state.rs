//! The per-request build state machine.

use std::fmt;

use serde::Serialize;
use zuri_common::InternalError;
use zuri_source::ModuleId;

/// Where a compilation request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildState {
    /// Not started.
    Pending,
    /// The fingerprint is known.
    FingerprintComputed,
    /// The cache holds an entry for the fingerprint.
    CacheHit,
    /// The entry must be built (or is being built by another request).
    CacheMiss,
    /// Parsing the source.
    Parsing,
    /// Lowering the syntax tree.
    Lowering,
    /// Encoding the IR.
    Serializing,
    /// Writing the cache entry.
    CacheInsert,
    /// Finished with IR.
    Done,
    /// Finished with an error.
    Failed,
}

impl BuildState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_advance_to(self, next: BuildState) -> bool {
        use BuildState::*;
        matches!(
            (self, next),
            (Pending, FingerprintComputed)
                | (FingerprintComputed, CacheHit | CacheMiss | Failed)
                | (CacheHit, Done | CacheMiss)
                | (CacheMiss, Parsing | Done | Failed)
                | (Parsing, Lowering | Failed)
                | (Lowering, Serializing | Failed)
                | (Serializing, CacheInsert | Failed)
                | (CacheInsert, Done | Failed)
        )
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The states a request went through, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTrace {
    module: ModuleId,
    states: Vec<BuildState>,
}

impl BuildTrace {
    /// A fresh trace in [`BuildState::Pending`].
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            states: vec![BuildState::Pending],
        }
    }

    /// The module the trace belongs to.
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// The current state.
    pub fn current(&self) -> BuildState {
        self.states.last().copied().unwrap_or(BuildState::Pending)
    }

    /// Every state visited, starting with `Pending`.
    pub fn states(&self) -> &[BuildState] {
        &self.states
    }

    /// Whether the trace visited `state`.
    pub fn visited(&self, state: BuildState) -> bool {
        self.states.contains(&state)
    }

    /// Moves to `next`. Illegal transitions are toolchain bugs.
    pub fn advance(&mut self, next: BuildState) -> Result<(), InternalError> {
        let current = self.current();
        if !current.can_advance_to(next) {
            return Err(InternalError::new(format!(
                "illegal build transition {current} -> {next} for module '{}'",
                self.module
            )));
        }
        tracing::debug!(module = %self.module, from = %current, to = %next, "build state");
        self.states.push(next);
        Ok(())
    }

    /// Moves to [`BuildState::Failed`] when that is legal from the current
    /// state, and does nothing otherwise.
    pub(crate) fn fail(&mut self) {
        if self.current().can_advance_to(BuildState::Failed) {
            self.states.push(BuildState::Failed);
        }
    }
}
