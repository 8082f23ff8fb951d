// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod grep;
pub mod logging;
pub mod modifier;
pub mod pattern;
pub mod project;
pub mod scope;
pub mod state;
pub mod types;
pub mod value;
pub mod workspace;

use anyhow::{Result, bail};
use tracing::debug;

use crate::cli::CliArgs;
use crate::workspace::{Workspace, WorkspaceOptions};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - rule file loading and validation
/// - project construction
/// - building the requested goals
/// - reporting diagnostics
pub async fn run(args: CliArgs) -> Result<()> {
    let path = args.rules_path();
    let options = WorkspaceOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
    };
    let workspace = Workspace::load(&path, options)?;

    if args.print_rules {
        workspace.print_rules();
        return Ok(());
    }

    let report = workspace.build(&args.goals).await;
    debug!(
        updated = report.updated.len(),
        up_to_date = report.up_to_date.len(),
        failed = report.failed.len(),
        "build finished"
    );
    if !report.success() {
        bail!("build failed: {}", failed_summary(&report.failed));
    }
    Ok(())
}

fn failed_summary(failed: &[String]) -> String {
    if failed.is_empty() {
        "errors were reported".to_string()
    } else {
        format!("could not build {}", failed.join(", "))
    }
}
