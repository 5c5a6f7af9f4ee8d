//! `zuri shell` starts the interactive shell on stdin and stdout.

use zuri_runtime::{Repl, StdioSession};

use crate::pipeline::{close_cache, compiler_options, create_compiler, load_workspace, open_cache};
use crate::GlobalArgs;

/// Runs the `zuri shell` command until end of input or `:quit`.
///
/// Fragments go through the project's cache like any other module, and
/// may import the project's modules.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = load_workspace(global)?;
    let cache = open_cache(&settings)?;
    let compiler = create_compiler(&settings, cache.clone(), compiler_options(&settings));

    let stdin = std::io::stdin();
    let mut session = StdioSession::new(stdin.lock(), std::io::stdout());
    let mut repl = Repl::new(compiler);
    repl.run(&mut session)?;
    tracing::debug!(instances = repl.runtime().instance_count(), "shell closed");

    drop(repl);
    close_cache(cache);
    Ok(0)
}
