//! FileCheck-style tests for MIR files
//!
//! Every file under `tests/filetests` names its packetizer options in
//! `; RUN:` lines and the expected output in `; CHECK:` lines.

use std::fs;
use std::path::{Path, PathBuf};
use vliw_packetizer::test_mir::{TestRunner, TestSpec};

fn filetest_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/filetests")
}

/// Test helper that runs a MIR file through FileCheck validation
fn run_filecheck_test(mir_file: &str) {
    let _ = env_logger::builder().is_test(true).try_init();

    let path = filetest_dir().join(mir_file);
    let contents = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));

    let spec = TestSpec::parse(&contents)
        .unwrap_or_else(|e| panic!("Failed to parse test spec from {}: {}", mir_file, e));

    let runner = TestRunner::new(false);
    runner
        .run_test(&spec)
        .unwrap_or_else(|e| panic!("Test {} failed: {}", mir_file, e));
}

#[test]
fn test_independent_filecheck() {
    run_filecheck_test("independent.mir");
}

#[test]
fn test_stores_filecheck() {
    run_filecheck_test("stores.mir");
}

#[test]
fn test_single_store_filecheck() {
    run_filecheck_test("single_store.mir");
}

#[test]
fn test_new_value_filecheck() {
    run_filecheck_test("new_value.mir");
}

#[test]
fn test_rollback_filecheck() {
    run_filecheck_test("rollback.mir");
}

#[test]
fn test_allocframe_filecheck() {
    run_filecheck_test("allocframe.mir");
}

#[test]
fn test_branches_filecheck() {
    run_filecheck_test("branches.mir");
}

#[test]
fn test_volatiles_filecheck() {
    run_filecheck_test("volatiles.mir");
    run_filecheck_test("no_volatiles.mir");
}

#[test]
fn test_pseudos_filecheck() {
    run_filecheck_test("pseudos.mir");
}

#[test]
fn test_stalls_filecheck() {
    run_filecheck_test("stalls.mir");
}

#[test]
fn test_disabled_filecheck() {
    run_filecheck_test("disabled.mir");
}

/// Any file dropped into the directory is picked up without a named test.
#[test]
fn run_all_mir_files() {
    let mut files: Vec<_> = fs::read_dir(filetest_dir())
        .expect("filetest directory")
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("mir"))
        .collect();
    files.sort();
    assert!(!files.is_empty());

    let mut failures = Vec::new();
    for path in &files {
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
        let result = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|contents| TestSpec::parse(&contents))
            .and_then(|spec| TestRunner::new(false).run_test(&spec));
        if let Err(e) = result {
            failures.push(format!("{name}: {e}"));
        }
    }
    assert!(failures.is_empty(), "failed filetests:\n{}", failures.join("\n"));
}
