// tests/modifiers.rs

mod common;

use std::error::Error;
use std::fs;
use std::sync::Arc;

use rulemake_test_utils::builders::{RuleBuilder, RulesFileBuilder};
use rulemake_test_utils::fake_executor::FakeExecutor;
use rulemake_test_utils::{init_tracing, with_timeout};

use rulemake::config::RulesFile;
use rulemake::engine::Severity;
use rulemake::types::Language;
use rulemake::workspace::BuildReport;

use common::{goals, workspace};

type TestResult = Result<(), Box<dyn Error>>;

async fn build(rules: &RulesFile, exec: &FakeExecutor, goal: &[&str]) -> (tempfile::TempDir, BuildReport) {
    let dir = tempfile::tempdir().unwrap();
    let ws = workspace(dir.path(), rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&goals(goal))).await;
    (dir, report)
}

fn has_message(report: &BuildReport, text: &str) -> bool {
    report.diagnostics.iter().any(|d| d.message.contains(text))
}

#[tokio::test]
async fn once_runs_a_shared_prerequisite_a_single_time() -> TestResult {
    init_tracing();
    let rules = RulesFileBuilder::new()
        .with_rule(RuleBuilder::new("all").phony().depends("a").depends("b").build())
        .with_rule(RuleBuilder::new("a").phony().depends("gen").recipe("echo a").build())
        .with_rule(RuleBuilder::new("b").phony().depends("gen").recipe("echo b").build())
        .with_rule(
            RuleBuilder::new("gen")
                .phony()
                .modifier(&["once"])
                .recipe("echo gen")
                .build(),
        )
        .build();

    let exec = FakeExecutor::new();
    let (_dir, report) = build(&rules, &exec, &["all"]).await;
    assert!(report.success(), "{:?}", report.diagnostics);

    let commands = exec.commands();
    assert_eq!(commands.iter().filter(|c| *c == "echo gen").count(), 1);
    assert_eq!(commands.len(), 3);
    Ok(())
}

fn case_rules(mode: &str) -> RulesFile {
    RulesFileBuilder::new()
        .with_var("MODE", mode)
        .with_rule(
            RuleBuilder::new("mode")
                .phony()
                .modifier(&["case", "-subject=$(MODE)", "debug", "dbg"])
                .recipe("echo debug build")
                .build(),
        )
        .with_rule(
            RuleBuilder::new("mode")
                .phony()
                .modifier(&["case"])
                .recipe("echo release build")
                .build(),
        )
        .build()
}

#[tokio::test]
async fn case_selects_the_first_matching_program() -> TestResult {
    init_tracing();

    let exec = FakeExecutor::new();
    let (_dir, report) = build(&case_rules("debug"), &exec, &["mode"]).await;
    assert!(report.success());
    assert_eq!(exec.commands(), vec!["echo debug build"]);

    let exec = FakeExecutor::new();
    let (_dir, report) = build(&case_rules("release"), &exec, &["mode"]).await;
    assert!(report.success());
    assert_eq!(exec.commands(), vec!["echo release build"]);
    Ok(())
}

#[tokio::test]
async fn use_runs_a_use_rule_for_the_current_target() -> TestResult {
    init_tracing();
    let rules = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("compile")
                .use_rule()
                .param("opt=-O1")
                .recipe("cc $(opt) -o $@ main.c")
                .build(),
        )
        .with_rule(
            RuleBuilder::new("app")
                .phony()
                .modifier(&["use", "compile", "opt=-O3"])
                .build(),
        )
        .with_rule(RuleBuilder::new("lib").phony().modifier(&["use", "compile"]).build())
        .build();

    let exec = FakeExecutor::new();
    let (_dir, report) = build(&rules, &exec, &["app", "lib"]).await;
    assert!(report.success(), "{:?}", report.diagnostics);
    assert_eq!(exec.commands(), vec!["cc -O3 -o app main.c", "cc -O1 -o lib main.c"]);

    // Use rules are not goals of their own.
    let (_dir, report) = build(&rules, &FakeExecutor::new(), &["compile"]).await;
    assert_eq!(report.failed, vec!["compile"]);
    Ok(())
}

#[tokio::test]
async fn failing_recipe_fails_unless_ignored_and_checked() -> TestResult {
    init_tracing();
    let strict = RulesFileBuilder::new()
        .with_rule(RuleBuilder::new("test").phony().recipe("run-suite").recipe("echo after").build())
        .build();
    let exec = FakeExecutor::new();
    exec.respond("run-suite", 1, "");
    let (_dir, report) = build(&strict, &exec, &["test"]).await;
    assert_eq!(report.failed, vec!["test"]);
    assert!(has_message(&report, "recipe for 'test' failed with exit status 1"));
    assert_eq!(exec.commands(), vec!["run-suite"]);

    let lenient = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("test")
                .phony()
                .modifier(&["shell", "-i"])
                .modifier(&["check", "status=1", "stdout=re:^FAIL"])
                .recipe("run-suite")
                .build(),
        )
        .build();
    let exec = FakeExecutor::new();
    exec.respond("run-suite", 1, "FAIL: 3 tests\n");
    let (_dir, report) = build(&lenient, &exec, &["test"]).await;
    assert!(report.success(), "{:?}", report.diagnostics);
    Ok(())
}

#[tokio::test]
async fn assert_reports_expression_and_reason() -> TestResult {
    init_tracing();
    let rules = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("verify")
                .phony()
                .modifier(&["assert", "file=missing.txt", "-reason=need the file"])
                .recipe("echo never")
                .build(),
        )
        .build();
    let exec = FakeExecutor::new();
    let (_dir, report) = build(&rules, &exec, &["verify"]).await;
    assert_eq!(report.failed, vec!["verify"]);
    assert!(has_message(&report, "assertion failed: file=missing.txt: need the file"));
    assert!(exec.jobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn cond_skips_the_rest_of_the_group() -> TestResult {
    init_tracing();
    let rules = RulesFileBuilder::new()
        .with_var("ENABLED", "")
        .with_rule(
            RuleBuilder::new("docs")
                .phony()
                .modifier(&["cond", "var=ENABLED"])
                .recipe("build-docs")
                .build(),
        )
        .build();
    let exec = FakeExecutor::new();
    let (_dir, report) = build(&rules, &exec, &["docs"]).await;
    assert!(report.success());
    assert_eq!(report.up_to_date, vec!["docs"]);
    assert!(exec.jobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn bare_word_comparisons_drive_cond_and_assert() -> TestResult {
    init_tracing();
    let rules = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("fast")
                .phony()
                .modifier(&["cond", "debug==debug"])
                .recipe("echo fast")
                .build(),
        )
        .with_rule(
            RuleBuilder::new("strict")
                .phony()
                .modifier(&["assert", "debug==release"])
                .recipe("echo strict")
                .build(),
        )
        .build();

    let exec = FakeExecutor::new();
    let (_dir, report) = build(&rules, &exec, &["fast"]).await;
    assert!(report.success(), "{:?}", report.diagnostics);
    assert_eq!(exec.commands(), vec!["echo fast"]);

    let exec = FakeExecutor::new();
    let (_dir, report) = build(&rules, &exec, &["strict"]).await;
    assert_eq!(report.failed, vec!["strict"]);
    assert!(has_message(&report, "assertion failed: debug==release"));
    assert!(exec.jobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn cd_changes_only_the_recipe_directory() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("sub"))?;
    let rules = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("all")
                .phony()
                .depends("inner")
                .recipe("outer-step")
                .build(),
        )
        .with_rule(
            RuleBuilder::new("inner")
                .phony()
                .modifier(&["cd", "sub"])
                .recipe("inner-step")
                .build(),
        )
        .build();

    let exec = FakeExecutor::new();
    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    assert!(with_timeout(ws.build(&[])).await.success());

    let jobs = exec.jobs();
    assert_eq!(jobs[0].command, "inner-step");
    assert_eq!(jobs[0].dir, dir.path().join("sub"));
    assert_eq!(jobs[1].command, "outer-step");
    assert_eq!(jobs[1].dir, dir.path());
    Ok(())
}

#[tokio::test]
async fn append_file_accumulates_plain_output() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let rules = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("log")
                .phony()
                .language(Language::Plain)
                .modifier(&["append-file", "build.log"])
                .recipe("built $@")
                .build(),
        )
        .build();

    for _ in 0..2 {
        let ws = workspace(dir.path(), &rules, Arc::new(FakeExecutor::new()));
        assert!(with_timeout(ws.build(&[])).await.success());
    }
    let text = fs::read_to_string(dir.path().join("build.log"))?;
    assert_eq!(text, "built log\nbuilt log\n");
    Ok(())
}

#[tokio::test]
async fn self_invocation_stops_at_the_recursion_limit() -> TestResult {
    init_tracing();
    let rules = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("loop")
                .phony()
                .language(Language::Plain)
                .recipe("$(=> loop)")
                .build(),
        )
        .build();

    let (_dir, report) = build(&rules, &FakeExecutor::new(), &["loop"]).await;
    assert_eq!(report.failed, vec!["loop"]);
    assert!(has_message(&report, "max recursion reached for 'loop' (16 nested invocations)"));
    // Reported once as a failure, not once per level.
    let hits: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.message.contains("max recursion"))
        .collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].severity, Severity::Fail);
    Ok(())
}

#[tokio::test]
async fn max_visit_limits_repeated_invocations() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let rules = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("all")
                .phony()
                .language(Language::Plain)
                .recipe("$(=> tick) $(=> tick) $(=> tick)")
                .build(),
        )
        .with_rule(
            RuleBuilder::new("tick")
                .phony()
                .modifier(&["target-max-visit", "2"])
                .recipe("echo tick")
                .build(),
        )
        .build();

    let exec = FakeExecutor::new();
    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    assert!(with_timeout(ws.build(&[])).await.success());
    assert_eq!(exec.commands(), vec!["echo tick", "echo tick"]);
    Ok(())
}
