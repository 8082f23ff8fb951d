// tests/pattern_rules.rs

mod common;

use std::error::Error;
use std::fs;
use std::sync::Arc;

use rulemake_test_utils::builders::{RuleBuilder, RulesFileBuilder};
use rulemake_test_utils::fake_executor::FakeExecutor;
use rulemake_test_utils::{init_tracing, with_timeout};

use rulemake::config::parse_str;
use rulemake::types::Language;

use common::{goals, workspace, write};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn percent_rule_binds_the_stem_and_stencils_prerequisites() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "foo.c", "int main;");

    let rules = RulesFileBuilder::new()
        .with_var("CC", "cc")
        .with_rule(
            RuleBuilder::new("%.o")
                .depends("%.c")
                .recipe("$(CC) -c $< -o $@ # $*")
                .build(),
        )
        .build();
    let exec = FakeExecutor::new();
    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&goals(&["foo.o"]))).await;
    assert!(report.success(), "{:?}", report.diagnostics);

    let expected = format!(
        "cc -c {} -o {} # foo",
        dir.path().join("foo.c").display(),
        dir.path().join("foo.o").display()
    );
    assert_eq!(exec.commands(), vec![expected]);
    Ok(())
}

#[tokio::test]
async fn concurrent_traversals_keep_their_own_automatic_variables() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut all = RuleBuilder::new("all").phony();
    for name in ["a", "b", "c", "d"] {
        all = all.depends(&format!("{name}.out"));
    }
    let rules = RulesFileBuilder::new()
        .with_jobs(4)
        .with_rule(all.build())
        .with_rule(
            RuleBuilder::new("%.out")
                .language(Language::Plain)
                .recipe("stem=$*")
                .modifier(&["write-file"])
                .build(),
        )
        .build();

    let ws = workspace(dir.path(), &rules, Arc::new(FakeExecutor::new()));
    let report = with_timeout(ws.build(&goals(&["all"]))).await;
    assert!(report.success(), "{:?}", report.diagnostics);

    for name in ["a", "b", "c", "d"] {
        let text = fs::read_to_string(dir.path().join(format!("{name}.out")))?;
        assert_eq!(text, format!("stem={name}\n"));
    }
    Ok(())
}

#[tokio::test]
async fn glob_prerequisites_expand_to_sorted_files() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "src/b.c", "");
    write(dir.path(), "src/a.c", "");
    write(dir.path(), "src/skip.h", "");

    let rules = RulesFileBuilder::new()
        .with_rule(
            RuleBuilder::new("list")
                .phony()
                .depends("src/*.c")
                .recipe("echo $^")
                .build(),
        )
        .build();
    let exec = FakeExecutor::new();
    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    assert!(with_timeout(ws.build(&[])).await.success());

    let expected = format!(
        "echo {} {}",
        dir.path().join("src/a.c").display(),
        dir.path().join("src/b.c").display()
    );
    assert_eq!(exec.commands(), vec![expected]);
    Ok(())
}

#[tokio::test]
async fn qualified_names_reach_into_using_projects() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("tools"))?;

    let rules = parse_str(
        r#"
using = ["tools"]

[[rule]]
targets = ["all"]
phony = true
depends = ["tools::gen"]
recipes = ["echo $(tools::GREETING) from main"]

[project.tools]
dir = "tools"

[project.tools.vars]
GREETING = "hello"

[[project.tools.rule]]
targets = ["gen"]
phony = true
recipes = ["generate $(GREETING)"]
"#,
    )?;

    let exec = FakeExecutor::new();
    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&[])).await;
    assert!(report.success(), "{:?}", report.diagnostics);

    let jobs = exec.jobs();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].command, "generate hello");
    assert_eq!(jobs[0].dir, dir.path().join("tools"));
    assert_eq!(jobs[1].command, "echo hello from main");
    Ok(())
}

#[tokio::test]
async fn base_project_rules_and_variables_are_inherited() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write(dir.path(), "main.c", "");

    let rules = parse_str(
        r#"
bases = ["common"]

[vars]
CFLAGS = "-O2"

[[rule]]
targets = ["app"]
phony = true
depends = ["main.o"]

[project.common.vars]
CC = "clang"
CFLAGS = "-O0"

[[project.common.rule]]
targets = ["%.o"]
depends = ["%.c"]
recipes = ["$(CC) $(CFLAGS) -c $*.c"]
"#,
    )?;

    let exec = FakeExecutor::new();
    let ws = workspace(dir.path(), &rules, Arc::new(exec.clone()));
    let report = with_timeout(ws.build(&[])).await;
    assert!(report.success(), "{:?}", report.diagnostics);
    assert_eq!(exec.commands(), vec!["clang -O0 -c main.c"]);
    Ok(())
}
