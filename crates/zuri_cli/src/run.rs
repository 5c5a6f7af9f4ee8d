//! `zuri run` compiles a module and executes it with its dependencies.

use std::io::Write;

use zuri_runtime::Runtime;

use crate::pipeline::{
    close_cache, compiler_options, create_compiler, entry_module, load_workspace, open_cache,
    render_diagnostic,
};
use crate::GlobalArgs;

/// Runs the `zuri run` command. `print` output goes to stdout as it
/// happens. Returns exit code 1 if compilation or execution failed.
pub fn run(module: Option<&str>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = load_workspace(global)?;
    let module = entry_module(module, &settings)?;
    let cache = open_cache(&settings)?;
    let compiler = create_compiler(&settings, cache.clone(), compiler_options(&settings));

    let mut runtime = Runtime::with_writer(Box::new(std::io::stdout()));
    let code = match compiler.run(&module, &mut runtime) {
        Ok(program) => {
            tracing::info!(module = %module, modules = program.modules.len(), "run finished");
            0
        }
        Err(err) => {
            std::io::stdout().flush()?;
            render_diagnostic(&err.to_diagnostic(), compiler.sources(), global.color);
            1
        }
    };
    drop(compiler);
    close_cache(cache);
    Ok(code)
}
