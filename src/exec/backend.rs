// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! Modifiers talk to an `ExecutorBackend` instead of spawning processes
//! directly. This makes it easy to swap in a fake executor in tests while
//! keeping the production implementation in [`command`](super::command).

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;

use super::ExecResult;
use super::command::run_shell;

/// One recipe command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeJob {
    /// Target the recipe updates, for logging.
    pub target: String,
    pub command: String,
    /// Working directory of the process.
    pub dir: PathBuf,
}

/// Trait abstracting how recipe commands are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send + Sync {
    fn run(&self, job: RecipeJob) -> Pin<Box<dyn Future<Output = Result<ExecResult>> + Send + '_>>;
}

/// Real executor backend used in production: `sh -c` per command.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealExecutorBackend;

impl ExecutorBackend for RealExecutorBackend {
    fn run(&self, job: RecipeJob) -> Pin<Box<dyn Future<Output = Result<ExecResult>> + Send + '_>> {
        Box::pin(async move { Ok(run_shell(&job.target, &job.command, &job.dir).await?) })
    }
}
