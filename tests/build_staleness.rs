// tests/build_staleness.rs

mod common;

use std::error::Error;
use std::fs;
use std::sync::Arc;

use rulemake_test_utils::builders::{RuleBuilder, RulesFileBuilder};
use rulemake_test_utils::fake_executor::FakeExecutor;
use rulemake_test_utils::{init_tracing, with_timeout};

use rulemake::config::RulesFile;

use common::{goals, options, set_mtime, workspace, workspace_with, write};

type TestResult = Result<(), Box<dyn Error>>;

fn copy_rules(recipe: &str) -> RulesFile {
    RulesFileBuilder::new()
        .with_rule(RuleBuilder::new("out.txt").depends("in.txt").recipe(recipe).build())
        .build()
}

#[tokio::test]
async fn out_of_date_target_is_rebuilt_once_and_then_skipped() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "in.txt", "hello");
    set_mtime(dir.path(), "in.txt", -100);

    let exec = FakeExecutor::new().touching_targets();
    let rules = copy_rules("cp in.txt out.txt");

    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&goals(&["out.txt"]))).await;
    assert!(report.success(), "{:?}", report.diagnostics);
    assert_eq!(report.updated, vec!["out.txt"]);
    assert_eq!(exec.commands(), vec!["cp in.txt out.txt"]);

    // A second run sees an up-to-date target.
    exec.clear();
    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&goals(&["out.txt"]))).await;
    assert!(report.success());
    assert_eq!(report.up_to_date, vec!["out.txt"]);
    assert!(exec.commands().is_empty());

    // Touching the prerequisite makes it stale again.
    set_mtime(dir.path(), "in.txt", 100);
    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&[])).await;
    assert_eq!(report.updated, vec!["out.txt"]);
    assert_eq!(exec.commands(), vec!["cp in.txt out.txt"]);
    Ok(())
}

#[tokio::test]
async fn changed_recipe_rebuilds_an_otherwise_fresh_target() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "in.txt", "hello");
    set_mtime(dir.path(), "in.txt", -100);
    let exec = FakeExecutor::new().touching_targets();

    let ws = workspace(dir.path(), &copy_rules("cp in.txt out.txt"), Arc::new(exec.clone()));
    assert!(with_timeout(ws.build(&[])).await.success());

    exec.clear();
    let ws = workspace(dir.path(), &copy_rules("cp -p in.txt out.txt"), Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&[])).await;
    assert_eq!(report.updated, vec!["out.txt"]);
    assert_eq!(exec.commands(), vec!["cp -p in.txt out.txt"]);
    Ok(())
}

#[tokio::test]
async fn checksum_detects_content_edits_with_a_newer_mtime() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "in.txt", "hello");
    set_mtime(dir.path(), "in.txt", -100);
    let exec = FakeExecutor::new().touching_targets();

    let plain = copy_rules("cp in.txt out.txt");
    let checked = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("out.txt")
                .depends("in.txt")
                .modifier(&["dirty", "-checksum"])
                .recipe("cp in.txt out.txt")
                .build(),
        )
        .build();

    let ws = workspace(dir.path(), &checked, Arc::new(exec.clone()));
    assert!(with_timeout(ws.build(&[])).await.success());

    // Hand-edit the output: mtime alone says it is fresh.
    fs::write(dir.path().join("out.txt"), "edited by hand")?;

    exec.clear();
    let ws = workspace(dir.path(), &plain, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&[])).await;
    assert_eq!(report.up_to_date, vec!["out.txt"]);

    let ws = workspace(dir.path(), &checked, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&[])).await;
    assert_eq!(report.updated, vec!["out.txt"]);
    assert_eq!(exec.commands(), vec!["cp in.txt out.txt"]);
    Ok(())
}

#[tokio::test]
async fn dry_run_prints_instead_of_running() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "in.txt", "hello");
    let exec = FakeExecutor::new();

    let mut opts = options(dir.path());
    opts.dry_run = true;
    let ws = workspace_with(dir.path(), &copy_rules("cp in.txt out.txt"), Arc::new(exec.clone()), opts);
    let report = with_timeout(ws.build(&[])).await;
    assert!(report.success());
    assert_eq!(report.updated, vec!["out.txt"]);
    assert!(exec.jobs().is_empty());
    assert!(!dir.path().join("out.txt").exists());
    Ok(())
}

#[tokio::test]
async fn missing_prerequisite_without_rule_fails_the_goal() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exec = FakeExecutor::new();
    let rules = RulesFileBuilder::new()
        .with_rule(RuleBuilder::new("out.txt").depends("nowhere.txt").recipe("touch out.txt").build())
        .build();

    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&[])).await;
    assert!(!report.success());
    assert_eq!(report.failed, vec!["out.txt"]);
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.message.contains("no rule to update target 'nowhere.txt'"))
    );
    assert!(exec.jobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_goal_is_reported() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let ws = workspace(dir.path(), &copy_rules("true"), Arc::new(FakeExecutor::new()));
    let report = with_timeout(ws.build(&goals(&["nothing-here"]))).await;
    assert_eq!(report.failed, vec!["nothing-here"]);
    Ok(())
}

#[tokio::test]
async fn prerequisite_breakers_outrank_a_matching_checksum() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "in.txt", "hello");
    set_mtime(dir.path(), "in.txt", -100);
    let exec = FakeExecutor::new().touching_targets();

    let checked = |extra: Option<&str>| {
        let mut out = RuleBuilder::new("out.txt")
            .depends("in.txt")
            .modifier(&["dirty", "-checksum"])
            .recipe("cp in.txt out.txt");
        if let Some(dep) = extra {
            out = out.depends(dep);
        }
        RulesFileBuilder::new()
            .with_rule(out.build())
            .with_rule(
                RuleBuilder::new("feature-check")
                    .phony()
                    .modifier(&["case", "-subject=off", "on"])
                    .build(),
            )
            .build()
    };

    let ws = workspace(dir.path(), &checked(None), Arc::new(exec.clone()));
    assert!(with_timeout(ws.build(&goals(&["out.txt"]))).await.success());

    // Content and recipe are unchanged, but the feature check yields no result.
    exec.clear();
    let ws = workspace(dir.path(), &checked(Some("feature-check")), Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&goals(&["out.txt"]))).await;
    assert_eq!(report.updated, vec!["out.txt"]);
    assert_eq!(exec.commands(), vec!["cp in.txt out.txt"]);
    Ok(())
}

#[tokio::test]
async fn cycle_between_sibling_prerequisites_fails_instead_of_hanging() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let exec = FakeExecutor::new().touching_targets();
    let rules = RulesFileBuilder::new()
        .with_rule(RuleBuilder::new("all").phony().depends("a.txt").depends("b.txt").build())
        .with_rule(RuleBuilder::new("a.txt").depends("b.txt").recipe("touch a.txt").build())
        .with_rule(RuleBuilder::new("b.txt").depends("a.txt").recipe("touch b.txt").build())
        .build();

    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&goals(&["all"]))).await;
    assert!(!report.success());
    assert_eq!(report.failed, vec!["all"]);
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.message.contains("dependency cycle") || d.message.contains("max recursion")),
        "{:?}",
        report.diagnostics
    );
    assert!(exec.commands().is_empty());
    Ok(())
}
