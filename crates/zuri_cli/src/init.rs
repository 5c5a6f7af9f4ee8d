//! `zuri init` creates a new project.
//!
//! Creates the standard layout: a `zuri.toml` config file, `src/main.zr`
//! importing a small library module in `src/greet.zr`, and a `.gitignore`
//! that keeps the cache directory out of version control.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::GlobalArgs;

/// Runs the `zuri init` command.
///
/// If `name` is `Some`, creates a new subdirectory with that name.
/// Otherwise initializes in the current working directory, which must not
/// already contain a `zuri.toml`.
pub fn run(name: Option<String>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = match &name {
        Some(n) => {
            let dir = PathBuf::from(n);
            if dir.exists() {
                return Err(format!("directory '{n}' already exists").into());
            }
            fs::create_dir_all(&dir)?;
            dir
        }
        None => std::env::current_dir()?,
    };
    let created = scaffold(&project_dir)?;

    if !global.quiet {
        eprintln!("  Creating new Zuri project `{}`", project_name(&project_dir));
        for path in created {
            eprintln!("     Created {}", path.display());
        }
    }
    Ok(0)
}

fn project_name(dir: &Path) -> &str {
    dir.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("my_project")
}

/// Writes the project files into `root` and returns their paths.
pub fn scaffold(root: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let config = root.join(zuri_config::CONFIG_FILE_NAME);
    if config.exists() {
        return Err(format!("{} already exists", config.display()).into());
    }
    fs::create_dir_all(root.join("src"))?;

    let files = [
        (config, config_template(project_name(root))),
        (root.join("src").join("main.zr"), MAIN_TEMPLATE.to_string()),
        (root.join("src").join("greet.zr"), GREET_TEMPLATE.to_string()),
        (root.join(".gitignore"), "/.zuri/\n".to_string()),
    ];
    let mut created = Vec::new();
    for (path, content) in files {
        if write_new(&path, &content)? {
            created.push(path);
        }
    }
    Ok(created)
}

/// Writes `content` unless `path` exists. Returns whether it wrote.
fn write_new(path: &Path, content: &str) -> io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, content)?;
    Ok(true)
}

fn config_template(name: &str) -> String {
    format!(
        r#"[project]
name = "{name}"
version = "0.1.0"
main = "main"

[sources]
roots = ["src"]
extension = "zr"

[build]
jobs = 0
optimize = false

[cache]
dir = ".zuri/cache"
max_size = "256MiB"
max_age = "30d"

[log]
level = "warn"
"#
    )
}

const MAIN_TEMPLATE: &str = r#"import greet

print(greet.hello("world"))
"#;

const GREET_TEMPLATE: &str = r#"def hello(name: Str) -> Str {
    return "hello, " + name
}
"#;
