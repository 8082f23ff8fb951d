// src/exec/mod.rs

//! Process execution layer.
//!
//! Recipes are run as shell command lines through an [`ExecutorBackend`].
//!
//! - [`command`] spawns the actual processes with `tokio::process::Command`.
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `RealExecutorBackend` used in production, which tests can replace with a
//!   fake implementation.

pub mod backend;
pub mod command;

pub use backend::{ExecutorBackend, RealExecutorBackend, RecipeJob};

/// Outcome of one recipe command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}
