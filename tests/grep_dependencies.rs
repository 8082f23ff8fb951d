// tests/grep_dependencies.rs

mod common;

use std::error::Error;
use std::fs;
use std::sync::Arc;

use rulemake_test_utils::builders::{RuleBuilder, RulesFileBuilder};
use rulemake_test_utils::{init_tracing, with_timeout};

use rulemake::config::RulesFile;
use rulemake::exec::RealExecutorBackend;
use rulemake::grep::{GrepCache, side_file_path};

use common::{set_mtime, workspace, write};

type TestResult = Result<(), Box<dyn Error>>;

fn bundle_rules() -> RulesFile {
    RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("bundle.txt")
                .recipe("echo 'include a.inc' > bundle.txt")
                .recipe("echo built >> runs.log")
                .modifier(&["grep-files", r"include (\S+)"])
                .build(),
        )
        .build()
}

fn runs(dir: &std::path::Path) -> usize {
    fs::read_to_string(dir.join("runs.log"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn grepped_files_become_prerequisites_of_later_runs() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "a.inc", "payload");
    set_mtime(dir.path(), "a.inc", -100);
    let rules = bundle_rules();

    let ws = workspace(dir.path(), &rules, Arc::new(RealExecutorBackend));
    let report = with_timeout(ws.build(&[])).await;
    assert!(report.success(), "{:?}", report.diagnostics);
    assert_eq!(runs(dir.path()), 1);

    // The cache file now lists a.inc for the bundle.
    let cache = GrepCache::load(dir.path().join(".rulemake/grep-deps"));
    let entries = cache.get(&dir.path().join("bundle.txt")).expect("cached entry");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "a.inc");

    let ws = workspace(dir.path(), &rules, Arc::new(RealExecutorBackend));
    let report = with_timeout(ws.build(&[])).await;
    assert_eq!(report.up_to_date, vec!["bundle.txt"]);
    assert_eq!(runs(dir.path()), 1);

    // Editing the grepped file makes the bundle stale.
    set_mtime(dir.path(), "a.inc", 100);
    let ws = workspace(dir.path(), &rules, Arc::new(RealExecutorBackend));
    let report = with_timeout(ws.build(&[])).await;
    assert_eq!(report.updated, vec!["bundle.txt"]);
    assert_eq!(runs(dir.path()), 2);
    Ok(())
}

#[tokio::test]
async fn fresh_side_file_is_trusted_over_a_rescan() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "a.inc", "payload");
    write(dir.path(), "b.inc", "other");
    set_mtime(dir.path(), "a.inc", -100);
    set_mtime(dir.path(), "b.inc", -100);
    let rules = bundle_rules();

    let ws = workspace(dir.path(), &rules, Arc::new(RealExecutorBackend));
    assert!(with_timeout(ws.build(&[])).await.success());

    let bundle = dir.path().join("bundle.txt");
    let side = side_file_path(&dir.path().join(".rulemake"), &bundle);
    assert!(fs::read_to_string(&side)?.contains("a.inc"));

    // Hand-edited side file, dated after the next rebuild of the bundle.
    fs::write(&side, "0 1 9 b.inc\n")?;
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(300);
    fs::File::options().write(true).open(&side)?.set_modified(later)?;

    // The rebuilt bundle is grepped again; the side file is still newer, so
    // its records are reused instead of rescanning.
    set_mtime(dir.path(), "a.inc", 100);
    let ws = workspace(dir.path(), &rules, Arc::new(RealExecutorBackend));
    assert!(with_timeout(ws.build(&[])).await.success());

    let cache = GrepCache::load(dir.path().join(".rulemake/grep-deps"));
    let entries = cache.get(&bundle).expect("cached entry");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "b.inc");
    Ok(())
}

#[tokio::test]
async fn recursive_grep_tracks_nested_files_but_not_system_ones() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "top.inc", "include nested.inc\n");
    write(dir.path(), "nested.inc", "include sys.inc\n");
    set_mtime(dir.path(), "top.inc", -100);
    set_mtime(dir.path(), "nested.inc", -100);

    // sys.inc maps to a no-track directory that does not even exist.
    let rules = RulesFileBuilder::new()
        .with_file_map("sys.inc", &[("sysroot", true)])
        .with_rule(
            RuleBuilder::new("bundle.txt")
                .recipe("echo 'include top.inc' > bundle.txt")
                .recipe("echo built >> runs.log")
                .modifier(&["grep-files", r"include (\S+)", "-recursive"])
                .build(),
        )
        .build();

    let ws = workspace(dir.path(), &rules, Arc::new(RealExecutorBackend));
    let report = with_timeout(ws.build(&[])).await;
    assert!(report.success(), "{:?}", report.diagnostics);
    assert_eq!(runs(dir.path()), 1);

    let cache = GrepCache::load(dir.path().join(".rulemake/grep-deps"));
    let entries = cache.get(&dir.path().join("bundle.txt")).expect("cached entry");
    let mut names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["nested.inc", "top.inc"]);

    // The system header is neither a prerequisite nor missing.
    let ws = workspace(dir.path(), &rules, Arc::new(RealExecutorBackend));
    let report = with_timeout(ws.build(&[])).await;
    assert!(report.success(), "{:?}", report.diagnostics);
    assert_eq!(report.up_to_date, vec!["bundle.txt"]);
    assert!(report.diagnostics.iter().all(|d| !d.message.contains("sys.inc")));

    // A file found only through recursion still drives staleness.
    set_mtime(dir.path(), "nested.inc", 100);
    let ws = workspace(dir.path(), &rules, Arc::new(RealExecutorBackend));
    let report = with_timeout(ws.build(&[])).await;
    assert_eq!(report.updated, vec!["bundle.txt"]);
    assert_eq!(runs(dir.path()), 2);
    Ok(())
}
