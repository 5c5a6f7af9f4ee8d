//! Zuri CLI, the command-line interface for the Zuri toolchain.
//!
//! Provides `zuri init` for project scaffolding, `zuri build` and
//! `zuri run` for cached compilation and execution, `zuri shell` for the
//! interactive shell, and `zuri cache` for inspecting and trimming the
//! artifact cache.

#![warn(missing_docs)]

mod build;
mod cache;
mod init;
mod pipeline;
mod run;
mod shell;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Zuri, a small language with a content-addressed build cache.
#[derive(Parser, Debug)]
#[command(name = "zuri", version, about = "Zuri toolchain")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `zuri.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new Zuri project.
    Init {
        /// Project name (creates a subdirectory). If omitted, initializes in
        /// the current directory.
        name: Option<String>,
    },
    /// Compile a module and its dependencies, or every module in the
    /// source roots.
    Build(BuildArgs),
    /// Compile and run a module.
    Run {
        /// Module to run; defaults to `project.main`.
        module: Option<String>,
    },
    /// Start the interactive shell.
    Shell,
    /// Inspect or trim the artifact cache.
    Cache {
        /// The cache operation.
        #[command(subcommand)]
        action: CacheCommand,
    },
}

/// Arguments for the `zuri build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Module to build; every module in the source roots if omitted.
    pub module: Option<String>,

    /// Fold constant operations (overrides `build.optimize`).
    #[arg(short = 'O', long)]
    pub optimize: bool,

    /// Worker threads (overrides `build.jobs`).
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// `zuri cache` operations.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show the number and size of stored entries.
    Stats {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
    /// Remove old entries and trim the cache to its size limit.
    Evict {
        /// Size limit (e.g. "64MiB"); defaults to `cache.max_size`.
        #[arg(long)]
        max_size: Option<String>,
        /// Age limit (e.g. "7d"); defaults to `cache.max_age`.
        #[arg(long)]
        max_age: Option<String>,
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
    /// Remove every entry.
    Clear,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => is_terminal(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Init { name } => {
            pipeline::init_tracing(&global, None);
            init::run(name, &global)
        }
        Command::Build(ref args) => build::run(args, &global),
        Command::Run { ref module } => run::run(module.as_deref(), &global),
        Command::Shell => shell::run(&global),
        Command::Cache { ref action } => cache::run(action, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

fn is_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_init_default() {
        let cli = Cli::parse_from(["zuri", "init"]);
        match cli.command {
            Command::Init { name } => assert!(name.is_none()),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn parse_init_with_name() {
        let cli = Cli::parse_from(["zuri", "init", "hello"]);
        match cli.command {
            Command::Init { name } => assert_eq!(name.as_deref(), Some("hello")),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn parse_build_default() {
        let cli = Cli::parse_from(["zuri", "build"]);
        match cli.command {
            Command::Build(ref args) => {
                assert!(args.module.is_none());
                assert!(!args.optimize);
                assert!(args.jobs.is_none());
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_build_with_args() {
        let cli = Cli::parse_from(["zuri", "build", "app.main", "-O", "--jobs", "4"]);
        match cli.command {
            Command::Build(ref args) => {
                assert_eq!(args.module.as_deref(), Some("app.main"));
                assert!(args.optimize);
                assert_eq!(args.jobs, Some(4));
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_run_module() {
        let cli = Cli::parse_from(["zuri", "run", "tools.report"]);
        match cli.command {
            Command::Run { module } => assert_eq!(module.as_deref(), Some("tools.report")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_shell() {
        let cli = Cli::parse_from(["zuri", "shell"]);
        assert!(matches!(cli.command, Command::Shell));
    }

    #[test]
    fn parse_cache_evict() {
        let cli = Cli::parse_from([
            "zuri",
            "cache",
            "evict",
            "--max-size",
            "64MiB",
            "--max-age",
            "7d",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Cache {
                action:
                    CacheCommand::Evict {
                        max_size,
                        max_age,
                        format,
                    },
            } => {
                assert_eq!(max_size.as_deref(), Some("64MiB"));
                assert_eq!(max_age.as_deref(), Some("7d"));
                assert_eq!(format, ReportFormat::Json);
            }
            _ => panic!("expected Cache Evict command"),
        }
    }

    #[test]
    fn parse_cache_stats_and_clear() {
        let cli = Cli::parse_from(["zuri", "cache", "stats"]);
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheCommand::Stats {
                    format: ReportFormat::Text
                }
            }
        ));
        let cli = Cli::parse_from(["zuri", "cache", "clear"]);
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheCommand::Clear
            }
        ));
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["zuri", "--quiet", "--color", "never", "build"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.color, ColorChoice::Never);
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["zuri", "run", "--verbose", "--config", "/p/zuri.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("/p/zuri.toml"));
    }
}
