//! Cache round trips, corruption, schema changes and eviction.

use std::sync::mpsc;
use std::thread;

use zuri_build::{BuildState, CompileError, CompilerOptions, Origin};
use zuri_cache::{CacheError, EvictionPolicy, InsertOutcome};
use zuri_common::{CancellationToken, COMPILER_VERSION};
use zuri_conformance::{id, TestWorkspace};

#[test]
fn cached_ir_equals_built_ir() {
    let ws = TestWorkspace::new(&[("app", "var n = 0\nwhile n < 3 { n = n + 1 }\nprint(n)")]);
    let built = ws.compile("app").unwrap();
    let cached = ws.compile("app").unwrap();
    assert_eq!(built.origin, Origin::Built);
    assert_eq!(cached.origin, Origin::Cached);
    assert_eq!(*built.ir, *cached.ir);

    let entry = ws.cache.lookup(built.fingerprint).unwrap().unwrap();
    assert_eq!(entry.bytes, zuri_ir::serialize(&built.ir).unwrap());
    assert_eq!(entry.meta.compiler_version, COMPILER_VERSION);
    assert_eq!(ws.run_output("app").unwrap(), ["3"]);
}

#[test]
fn reinserting_identical_bytes_is_a_no_op() {
    let ws = TestWorkspace::new(&[("app", "let x = 1")]);
    let built = ws.compile("app").unwrap();
    let writes = ws.store.write_count();
    let bytes = zuri_ir::serialize(&built.ir).unwrap();
    let outcome = ws
        .cache
        .insert(built.fingerprint, &bytes, COMPILER_VERSION)
        .unwrap();
    assert_eq!(outcome, InsertOutcome::AlreadyPresent);
    assert_eq!(ws.store.write_count(), writes);
}

#[test]
fn different_bytes_under_one_fingerprint_is_corruption() {
    let ws = TestWorkspace::new(&[("app", "let x = 1")]);
    let built = ws.compile("app").unwrap();
    let err = ws
        .cache
        .insert(built.fingerprint, b"not the same payload", COMPILER_VERSION)
        .unwrap_err();
    assert!(matches!(err, CacheError::Corruption { fingerprint, .. } if fingerprint == built.fingerprint));
    assert_eq!(err.to_diagnostic().code.to_string(), "E303");

    // The stored entry is untouched.
    let cached = ws.compile("app").unwrap();
    assert_eq!(cached.origin, Origin::Cached);
    assert_eq!(*cached.ir, *built.ir);
}

#[test]
fn corruption_maps_to_a_compile_error() {
    let err = CompileError::from_cache(
        &id("app"),
        CacheError::Corruption {
            fingerprint: zuri_common::Fingerprint::from_raw([1; 16]),
            existing: zuri_common::ContentHash::from_bytes(b"a"),
            attempted: zuri_common::ContentHash::from_bytes(b"b"),
        },
    );
    assert!(matches!(err, CompileError::CacheCorruption { .. }));
    assert_eq!(err.module(), Some(&id("app")));
}

#[test]
fn newer_schema_forces_a_rebuild() {
    let ws = TestWorkspace::new(&[("app", "let x = 1 + 2")]);
    let first = ws.compile("app").unwrap();
    let old_reader = ws.compiler_with(CompilerOptions {
        max_schema_version: 0,
        ..CompilerOptions::default()
    });
    let rebuilt = old_reader.compile(&id("app")).unwrap();
    assert_eq!(rebuilt.fingerprint, first.fingerprint);
    assert_eq!(rebuilt.origin, Origin::Built);
    assert!(rebuilt.trace.visited(BuildState::CacheHit));
    assert!(rebuilt.trace.visited(BuildState::Parsing));
    assert_eq!(rebuilt.trace.current(), BuildState::Done);
    assert_eq!(ws.cache.stats().inserts, 2);
}

#[test]
fn store_outage_surfaces_after_retries() {
    let ws = TestWorkspace::new(&[("app", "let x = 1")]);
    ws.store.fail_next(1000);
    let err = ws.compile("app").unwrap_err();
    assert!(
        matches!(err, CompileError::StoreUnavailable { .. }),
        "unexpected {err:?}"
    );
    ws.store.fail_next(0);
    assert_eq!(ws.compile("app").unwrap().origin, Origin::Built);
}

#[test]
fn eviction_spares_pinned_entries() {
    let ws = TestWorkspace::new(&[("a", "let a = 1"), ("b", "let b = 2")]);
    let a = ws.compile("a").unwrap();
    let b = ws.compile("b").unwrap();
    let _pin = ws.cache.pin(a.fingerprint);

    let report = ws
        .cache
        .evict(EvictionPolicy {
            max_bytes: Some(0),
            max_age: None,
        })
        .unwrap();
    assert_eq!(report.removed, vec![b.fingerprint]);
    assert_eq!(report.protected, 1);
    assert!(ws.cache.contains(a.fingerprint).unwrap());
    assert!(!ws.cache.contains(b.fingerprint).unwrap());
}

#[test]
fn eviction_spares_in_flight_entries() {
    let ws = TestWorkspace::new(&[("a", "let a = 1")]);
    let a = ws.compile("a").unwrap();
    let fp = a.fingerprint;

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let cache = ws.cache.clone();
    let leader = thread::spawn(move || {
        cache
            .get_or_build(fp, &CancellationToken::new(), || {
                started_tx.send(()).ok();
                release_rx.recv().ok();
                Some(1u8)
            })
            .map(|flight| flight.value)
    });

    started_rx.recv().unwrap();
    assert!(ws.cache.is_in_flight(fp));
    let report = ws.cache.clear().unwrap();
    assert_eq!(report.protected, 1);
    assert!(report.removed.is_empty());
    assert!(ws.cache.contains(fp).unwrap());

    release_tx.send(()).unwrap();
    assert_eq!(leader.join().unwrap().unwrap(), 1);
    assert!(ws.cache.clear().unwrap().removed.contains(&fp));
}

#[test]
fn evicted_module_is_rebuilt_identically() {
    let ws = TestWorkspace::new(&[("app", "def sq(x: Int) -> Int { return x * x }\nprint(sq(7))")]);
    let first = ws.compile("app").unwrap();
    ws.cache.clear().unwrap();
    assert_eq!(ws.stored_keys(), 0);
    let again = ws.compile("app").unwrap();
    assert_eq!(again.origin, Origin::Built);
    assert_eq!(again.fingerprint, first.fingerprint);
    assert_eq!(*again.ir, *first.ir);
}
