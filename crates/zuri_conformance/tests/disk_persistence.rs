//! Artifacts survive across processes through the on-disk store.

use std::sync::Arc;

use tempfile::TempDir;
use zuri_build::{Compiler, Origin};
use zuri_cache::ArtifactCache;
use zuri_conformance::{id, DiskWorkspace};

fn shut_down(compiler: Compiler, cache: Arc<ArtifactCache>) {
    drop(compiler);
    let cache = Arc::try_unwrap(cache).unwrap_or_else(|_| panic!("cache still shared"));
    cache.close().unwrap();
}

const FILES: &[(&str, &str)] = &[
    ("util.math", "def square(n: Int) -> Int { return n * n }\nlet base = 3"),
    ("app", "import util.math as m\nprint(m.square(m.base))"),
];

#[test]
fn reopened_store_serves_cached_modules() {
    let tmp = TempDir::new().unwrap();
    let ws = DiskWorkspace::create(tmp.path(), FILES).unwrap();

    let (compiler, cache) = ws.open().unwrap();
    let first = compiler.compile_program(&id("app"), &Default::default()).unwrap();
    assert!(first.modules.iter().all(|m| m.origin == Origin::Built));
    shut_down(compiler, cache);

    let (compiler, cache) = ws.open().unwrap();
    let second = compiler.compile_program(&id("app"), &Default::default()).unwrap();
    assert!(second.modules.iter().all(|m| m.origin == Origin::Cached));
    for (a, b) in first.modules.iter().zip(&second.modules) {
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.ir, b.ir);
    }
    assert_eq!(cache.stats().inserts, 0);
    shut_down(compiler, cache);
}

#[test]
fn edited_file_rebuilds_only_its_importers() {
    let tmp = TempDir::new().unwrap();
    let ws = DiskWorkspace::create(tmp.path(), FILES).unwrap();
    let (compiler, cache) = ws.open().unwrap();
    compiler.compile(&id("app")).unwrap();
    shut_down(compiler, cache);

    DiskWorkspace::create(tmp.path(), &[("app", "import util.math as m\nprint(m.square(4))")]).unwrap();
    let (compiler, cache) = ws.open().unwrap();
    let program = compiler.compile_program(&id("app"), &Default::default()).unwrap();
    let origins: Vec<Origin> = program.modules.iter().map(|m| m.origin).collect();
    assert_eq!(origins, [Origin::Cached, Origin::Built]);
    shut_down(compiler, cache);
}

#[test]
fn cleared_store_starts_empty_after_reopen() {
    let tmp = TempDir::new().unwrap();
    let ws = DiskWorkspace::create(tmp.path(), FILES).unwrap();
    let (compiler, cache) = ws.open().unwrap();
    compiler.compile(&id("app")).unwrap();
    assert_eq!(cache.usage().unwrap().entries, 2);
    let report = cache.clear().unwrap();
    assert_eq!(report.removed.len(), 2);
    assert_eq!(report.bytes_remaining, 0);
    shut_down(compiler, cache);

    let (compiler, cache) = ws.open().unwrap();
    assert_eq!(cache.usage().unwrap().entries, 0);
    let app = compiler.compile(&id("app")).unwrap();
    assert_eq!(app.origin, Origin::Built);
    shut_down(compiler, cache);
}
