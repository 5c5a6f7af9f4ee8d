//! The interactive shell.
//!
//! Each complete fragment typed at the prompt is compiled as its own
//! module (`fragment1`, `fragment2`, ...) through a [`FragmentCompiler`],
//! instantiated in the shell's [`Runtime`], and its globals and imported
//! namespaces become visible to later fragments. Input that ends in the middle of a construct is
//! kept and continued on the next line.

use std::io;
use std::sync::Arc;

use zuri_common::Fingerprint;
use zuri_ir::IrModule;
use zuri_lower::Session;

use crate::interp::Runtime;
use crate::session::LineSession;

/// Prompt in insert mode.
pub const INSERT_PROMPT: &str = "zuri> ";
/// Prompt in command mode.
pub const COMMAND_PROMPT: &str = "zuri: ";
/// Prompt while a fragment is incomplete.
pub const INCOMPLETE_PROMPT: &str = "  ... ";
/// Prefix of result lines.
pub const RESULT_PREFIX: &str = "  --> ";

/// A module ready to instantiate.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    /// Its fingerprint.
    pub fingerprint: Fingerprint,
    /// Its IR.
    pub ir: Arc<IrModule>,
}

/// Why a fragment did not compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    /// The input ends inside a construct; more lines may complete it.
    Incomplete,
    /// The fragment does not parse. Holds the rendered diagnostic.
    Syntax(String),
    /// Any other failure. Holds the rendered diagnostic.
    Build(String),
}

/// Compiles shell fragments.
pub trait FragmentCompiler {
    /// Compiles `source` as fragment number `index` with `session` visible.
    ///
    /// Returns every module the fragment needs, dependencies first and the
    /// fragment itself last.
    fn compile_fragment(
        &self,
        index: usize,
        source: &str,
        session: &Session,
    ) -> Result<Vec<CompiledUnit>, FragmentError>;
}

/// How the shell interprets input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Lines are code; `:`-prefixed lines are commands.
    Insert,
    /// Lines are commands, with or without the `:` prefix.
    Command,
}

/// A shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    /// Show the command list.
    Help,
    /// Leave the shell.
    Quit,
    /// Toggle between insert and command mode.
    Mode,
    /// List the session globals.
    Symbols,
    /// Forget every session global.
    Reset,
    /// List the fragments entered so far.
    History,
}

/// Parses a command, with or without its leading `:`.
pub fn parse_command(input: &str) -> Result<ReplCommand, String> {
    let word = input.trim().trim_start_matches(':');
    match word {
        "help" | "h" | "?" => Ok(ReplCommand::Help),
        "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
        "mode" | "m" => Ok(ReplCommand::Mode),
        "symbols" | "s" => Ok(ReplCommand::Symbols),
        "reset" => Ok(ReplCommand::Reset),
        "history" => Ok(ReplCommand::History),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command ':{other}' (try :help)")),
    }
}

fn help_text() -> &'static str {
    "Commands:\n  \
     :help      show this list\n  \
     :quit      leave the shell\n  \
     :mode      switch between insert and command mode\n  \
     :symbols   list session globals\n  \
     :reset     forget every session global\n  \
     :history   list the fragments entered so far"
}

/// Whether the shell keeps running after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Read the next line.
    Continue,
    /// Stop.
    Quit,
}

/// The read-eval-print loop.
pub struct Repl<C> {
    compiler: C,
    runtime: Runtime,
    mode: InputMode,
    pending: String,
    next_fragment: usize,
}

impl<C: FragmentCompiler> Repl<C> {
    /// Creates a shell in insert mode with an empty session.
    pub fn new(compiler: C) -> Self {
        Self {
            compiler,
            runtime: Runtime::new(),
            mode: InputMode::Insert,
            pending: String::new(),
            next_fragment: 1,
        }
    }

    /// The current input mode.
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// The shell's runtime.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The prompt for the next line.
    pub fn prompt(&self) -> &'static str {
        if !self.pending.is_empty() {
            INCOMPLETE_PROMPT
        } else if self.mode == InputMode::Command {
            COMMAND_PROMPT
        } else {
            INSERT_PROMPT
        }
    }

    /// Reads and handles lines until end of input or `:quit`.
    pub fn run(&mut self, session: &mut dyn LineSession) -> io::Result<()> {
        session.write_line("Zuri interactive shell. Type :help for commands.")?;
        while let Some(line) = session.read_line(self.prompt())? {
            if self.handle_line(&line, session)? == Control::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Handles one input line.
    pub fn handle_line(&mut self, line: &str, session: &mut dyn LineSession) -> io::Result<Control> {
        let is_command = self.pending.is_empty()
            && (self.mode == InputMode::Command || line.trim_start().starts_with(':'));
        if is_command {
            if line.trim().is_empty() {
                return Ok(Control::Continue);
            }
            return match parse_command(line) {
                Ok(command) => self.execute(command, session),
                Err(message) => {
                    session.write_line(&message)?;
                    Ok(Control::Continue)
                }
            };
        }
        if self.pending.is_empty() && line.trim().is_empty() {
            return Ok(Control::Continue);
        }
        self.pending.push_str(line);
        self.pending.push('\n');
        self.evaluate_pending(session)?;
        Ok(Control::Continue)
    }

    fn execute(&mut self, command: ReplCommand, session: &mut dyn LineSession) -> io::Result<Control> {
        match command {
            ReplCommand::Help => session.write_line(help_text())?,
            ReplCommand::Quit => return Ok(Control::Quit),
            ReplCommand::Mode => {
                self.mode = match self.mode {
                    InputMode::Insert => InputMode::Command,
                    InputMode::Command => InputMode::Insert,
                };
            }
            ReplCommand::Symbols => {
                let visible = self.runtime.session();
                if visible.is_empty() {
                    session.write_line("no session globals")?;
                }
                for import in &visible.imports {
                    let module = import.module.as_str();
                    let line = if module.rsplit('.').next() == Some(import.alias.as_str()) {
                        format!("import {module}")
                    } else {
                        format!("import {module} as {}", import.alias)
                    };
                    session.write_line(&line)?;
                }
                for symbol in visible.globals {
                    let keyword = if symbol.mutable { "var" } else { "let" };
                    let value = self
                        .runtime
                        .session_value(&symbol.name)
                        .map(|v| v.repr())
                        .unwrap_or_else(|| "<uninitialized>".to_string());
                    session.write_line(&format!("{keyword} {} = {value}", symbol.name))?;
                }
            }
            ReplCommand::Reset => {
                self.runtime.reset();
                session.write_line("session cleared")?;
            }
            ReplCommand::History => {
                let lines: Vec<String> = session
                    .history()
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| format!("{:>4}  {}", i + 1, entry))
                    .collect();
                for line in lines {
                    session.write_line(&line)?;
                }
            }
        }
        Ok(Control::Continue)
    }

    fn evaluate_pending(&mut self, session: &mut dyn LineSession) -> io::Result<()> {
        let visible = self.runtime.session();
        let units = match self
            .compiler
            .compile_fragment(self.next_fragment, &self.pending, &visible)
        {
            Err(FragmentError::Incomplete) => return Ok(()),
            Err(FragmentError::Syntax(message)) => {
                self.pending.clear();
                return session.write_line(&format!("parse error: {message}"));
            }
            Err(FragmentError::Build(message)) => {
                session.add_history(self.pending.trim_end());
                self.pending.clear();
                return session.write_line(&format!("build error: {message}"));
            }
            Ok(units) => units,
        };
        session.add_history(self.pending.trim_end());
        self.pending.clear();
        self.next_fragment += 1;

        let mut last = None;
        for unit in units {
            match self.runtime.instantiate(unit.fingerprint, unit.ir) {
                Ok(done) => last = Some(done),
                Err(err) => {
                    self.flush_output(session)?;
                    return session.write_line(&format!("interpreter error: {err}"));
                }
            }
        }
        self.flush_output(session)?;
        if let Some(fragment) = last {
            self.runtime.expose_globals(fragment.instance);
            if let Some(value) = fragment.value {
                session.write_line(&format!("{RESULT_PREFIX}{}", value.repr()))?;
            }
        }
        Ok(())
    }

    fn flush_output(&mut self, session: &mut dyn LineSession) -> io::Result<()> {
        for line in self.runtime.take_output() {
            session.write_line(&line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StdioSession;
    use zuri_common::{FingerprintBuilder, Interner};
    use zuri_lower::{lower, DependencyInterface, LowerContext};
    use zuri_source::{FileId, ModuleId};

    /// Compiles fragments directly, without caching. Every fragment may
    /// import the one library module `util`.
    struct Direct {
        util: DependencyInterface,
    }

    impl Direct {
        fn new() -> Self {
            let interner = Interner::new();
            let tree =
                zuri_syntax::parse("def twice(n: Int) -> Int { return n * 2 }", FileId::from_raw(1), &interner)
                    .unwrap();
            let module = ModuleId::parse("util").unwrap();
            let ir = lower(&tree, &LowerContext::new(module.clone(), &interner)).unwrap();
            Self {
                util: DependencyInterface {
                    module,
                    fingerprint: FingerprintBuilder::new("test").str("util").finish(),
                    ir: Arc::new(ir),
                },
            }
        }
    }

    impl FragmentCompiler for Direct {
        fn compile_fragment(
            &self,
            index: usize,
            source: &str,
            session: &Session,
        ) -> Result<Vec<CompiledUnit>, FragmentError> {
            let interner = Interner::new();
            let tree = zuri_syntax::parse(source, FileId::from_raw(0), &interner).map_err(|e| {
                if e.is_incomplete() {
                    FragmentError::Incomplete
                } else {
                    FragmentError::Syntax(e.message)
                }
            })?;
            let module = ModuleId::parse(&format!("fragment{index}")).unwrap();
            let ctx = LowerContext::new(module, &interner)
                .with_dependencies(vec![self.util.clone()])
                .with_session(session.clone());
            let ir = lower(&tree, &ctx).map_err(|e| FragmentError::Build(e.message))?;
            let fingerprint = FingerprintBuilder::new("test").str(source).finish();
            Ok(vec![
                CompiledUnit {
                    fingerprint: self.util.fingerprint,
                    ir: self.util.ir.clone(),
                },
                CompiledUnit {
                    fingerprint,
                    ir: Arc::new(ir),
                },
            ])
        }
    }

    fn transcript(input: &str) -> String {
        let mut session = StdioSession::new(input.as_bytes(), Vec::new());
        Repl::new(Direct::new()).run(&mut session).unwrap();
        String::from_utf8(session.into_output()).unwrap()
    }

    #[test]
    fn evaluates_and_echoes_results() {
        let out = transcript("let x = 1 + 2\nx * 2\nprint(\"hi\")\n");
        assert!(out.contains("  --> 3\n"));
        assert!(out.contains("  --> 6\n"));
        assert!(out.contains("hi\n"));
    }

    #[test]
    fn incomplete_input_continues() {
        let out = transcript("def f(x) {\nreturn x + 1\n}\nf(41)\n");
        assert!(out.contains(INCOMPLETE_PROMPT));
        assert!(out.contains("  --> 42\n"));
    }

    #[test]
    fn errors_are_prefixed_by_stage() {
        let out = transcript("let = 1\ny + 1\nlet z = 1 / 0\n");
        assert!(out.contains("parse error: "));
        assert!(out.contains("build error: cannot find `y` in this scope"));
        assert!(out.contains("interpreter error: division by zero"));
    }

    #[test]
    fn session_globals_carry_over() {
        let out = transcript("var n = 1\nn = n + 1\n:symbols\n:reset\n:symbols\n");
        assert!(out.contains("var n = 2\n"));
        assert!(out.contains("session cleared\n"));
        assert!(out.contains("no session globals\n"));
    }

    #[test]
    fn imports_carry_over() {
        let out = transcript("import util
print(util.twice(4))
util.twice(5)
:symbols
");
        assert!(out.contains("8
"));
        assert!(out.contains("  --> 10
"));
        assert!(out.contains("import util
"));
        assert!(!out.contains("build error"));
    }

    #[test]
    fn rebinding_an_alias_drops_the_namespace() {
        let out = transcript("import util
let util = 3
util + 1
:symbols
");
        assert!(out.contains("  --> 4
"));
        assert!(out.contains("let util = 3
"));
        assert!(!out.contains("import util
"));
    }

    #[test]
    fn commands_and_modes() {
        let out = transcript(":mode\nhistory\nmode\n1 + 1\n:history\n:bogus\n:quit\n2 + 2\n");
        assert!(out.contains(COMMAND_PROMPT));
        assert!(out.contains("   1  1 + 1\n"));
        assert!(out.contains("unknown command ':bogus'"));
        assert!(!out.contains("  --> 4"));
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command(":help"), Ok(ReplCommand::Help));
        assert_eq!(parse_command("quit"), Ok(ReplCommand::Quit));
        assert_eq!(parse_command(" :symbols "), Ok(ReplCommand::Symbols));
        assert!(parse_command(":").is_err());
    }
}
