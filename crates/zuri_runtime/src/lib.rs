//! Execution of compiled Zuri modules.
//!
//! The [`Runtime`] interprets [`IrModule`](zuri_ir::IrModule)s produced by
//! the build pipeline. It never reads or writes the cache: runtime errors
//! are reported to the caller and nothing else. [`Repl`] layers the
//! interactive shell on top, compiling each fragment through a
//! [`FragmentCompiler`] supplied by the build crate.

#![warn(missing_docs)]

pub mod error;
pub mod interp;
pub mod repl;
pub mod session;
pub mod value;

pub use error::{RuntimeError, RuntimeErrorKind};
pub use interp::{Instantiated, Runtime, DEFAULT_MAX_CALL_DEPTH};
pub use repl::{
    parse_command, CompiledUnit, Control, FragmentCompiler, FragmentError, InputMode, Repl,
    ReplCommand, COMMAND_PROMPT, INCOMPLETE_PROMPT, INSERT_PROMPT, RESULT_PREFIX,
};
pub use session::{LineSession, StdioSession};
pub use value::{FunctionRef, Value};
