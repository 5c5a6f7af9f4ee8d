//! Diagnostic codes grouped by pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline stage that produced a diagnostic.
///
/// The stage selects the hundreds digit of the displayed code, so syntax
/// errors read `E1xx`, semantic errors `E2xx` and so on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Stage {
    /// Lexing and parsing.
    Syntax,
    /// Lowering: name resolution and type checks.
    Semantic,
    /// Cache and IR schema problems.
    Cache,
    /// Dependency graph and orchestration.
    Build,
    /// Program execution.
    Runtime,
}

impl Stage {
    /// The hundreds digit used when displaying codes of this stage.
    pub fn digit(self) -> u16 {
        match self {
            Stage::Syntax => 1,
            Stage::Semantic => 2,
            Stage::Cache => 3,
            Stage::Build => 4,
            Stage::Runtime => 5,
        }
    }
}

/// A stable diagnostic code such as `E101`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The stage that owns this code.
    pub stage: Stage,
    /// The number within the stage (0..=99).
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(stage: Stage, number: u16) -> Self {
        Self { stage, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}{:02}", self.stage.digit(), self.number % 100)
    }
}
