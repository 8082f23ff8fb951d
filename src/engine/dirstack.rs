// src/engine/dirstack.rs

//! Logical working directory of a traversal.
//!
//! The process-wide working directory is never changed. Each traversal keeps
//! its own stack of entered directories and recipes are spawned with the
//! top of that stack as their working directory.

use std::path::{Path, PathBuf};

use tracing::info;

#[derive(Debug, Clone)]
pub struct DirStack {
    base: PathBuf,
    stack: Vec<PathBuf>,
}

impl DirStack {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            stack: Vec::new(),
        }
    }

    pub fn current(&self) -> &Path {
        self.stack.last().unwrap_or(&self.base)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Enter `dir`, relative to the current directory unless absolute.
    pub fn enter(&mut self, dir: impl AsRef<Path>) -> &Path {
        let next = self.current().join(dir);
        info!("Entering directory '{}'", next.display());
        self.stack.push(next);
        self.current()
    }

    pub fn leave(&mut self) -> Option<PathBuf> {
        let left = self.stack.pop()?;
        info!("Leaving directory '{}'", left.display());
        Some(left)
    }

    pub fn leave_all(&mut self) {
        while self.leave().is_some() {}
    }
}
