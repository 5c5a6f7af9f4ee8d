//! `zuri build` compiles modules through the cache.
//!
//! With a module argument, that module and its dependencies are compiled.
//! Without one, every module found under the source roots is. Independent
//! modules build in parallel and a failure only stops its dependents.

use zuri_build::CompileError;

use crate::pipeline::{
    close_cache, compiler_options, create_compiler, discover_modules, load_workspace, open_cache,
    render_diagnostic,
};
use crate::{BuildArgs, GlobalArgs};

/// Runs the `zuri build` command. Returns exit code 0 if every module
/// compiled, 1 otherwise.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = load_workspace(global)?;
    let roots = match &args.module {
        Some(name) => vec![zuri_source::ModuleId::parse(name)?],
        None => discover_modules(&settings)?,
    };
    if roots.is_empty() {
        if !global.quiet {
            eprintln!(
                "warning: no .{} modules found in the source roots",
                settings.extension
            );
        }
        return Ok(0);
    }

    let mut options = compiler_options(&settings);
    options.optimize |= args.optimize;
    if let Some(jobs) = args.jobs {
        options.jobs = jobs;
    }

    if !global.quiet {
        eprintln!("   Compiling {} ({} root module(s))", settings.project_name, roots.len());
    }

    let cache = open_cache(&settings)?;
    let compiler = create_compiler(&settings, cache.clone(), options);
    let report = compiler.compile_all(&roots);

    let mut shown: Vec<&CompileError> = Vec::new();
    for failure in report.failures() {
        // Skipped dependents are listed with -v only.
        let skipped = matches!(failure, CompileError::DependencyFailed { .. }) && !global.verbose;
        if skipped || shown.contains(&failure) {
            continue;
        }
        shown.push(failure);
        render_diagnostic(&failure.to_diagnostic(), compiler.sources(), global.color);
    }
    if !global.quiet {
        eprintln!("    Finished {report}");
    }
    drop(compiler);
    close_cache(cache);

    Ok(if report.is_success() { 0 } else { 1 })
}
