// src/project/entry.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::engine::breaker::{BreakKind, Breaker, Flow};
use crate::engine::context::Context;
use crate::engine::program::Program;
use crate::engine::traversal::{BoxFuture, Invocation};
use crate::errors::RuleError;
use crate::pattern::Pattern;
use crate::value::Value;

/// Shape of the target an entry was declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    /// A concrete name.
    General,
    /// `%` pattern.
    Perc,
    Glob,
    Regexp,
    /// `%` pattern spanning several path components.
    PathPatt,
    /// Only reachable through the `use` modifier.
    Use,
}

/// Result of traversing an entry.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The target, re-stat'd if it is a file.
    pub target: Value,
    /// Whether any Program updated the target.
    pub updated: bool,
    /// Result buffer of every Program that ran.
    pub results: Vec<Value>,
}

pub struct RuleEntry {
    class: EntryClass,
    name: String,
    pattern: Option<Pattern>,
    phony: AtomicBool,
    programs: Mutex<Vec<Arc<Program>>>,
}

impl fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEntry")
            .field("class", &self.class)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl RuleEntry {
    pub fn new(class: EntryClass, name: impl Into<String>, pattern: Option<Pattern>) -> Self {
        Self {
            class,
            name: name.into(),
            pattern,
            phony: AtomicBool::new(false),
            programs: Mutex::new(Vec::new()),
        }
    }

    pub fn class(&self) -> EntryClass {
        self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    /// Abstract goal rather than a file.
    pub fn is_phony(&self) -> bool {
        self.phony.load(Ordering::Relaxed)
    }

    pub fn set_phony(&self) {
        self.phony.store(true, Ordering::Relaxed);
    }

    fn programs_guard(&self) -> MutexGuard<'_, Vec<Arc<Program>>> {
        self.programs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_program(&self, program: Arc<Program>) {
        self.programs_guard().push(program);
    }

    pub fn programs(&self) -> Vec<Arc<Program>> {
        self.programs_guard().clone()
    }

    /// Run every Program of the entry for one target.
    ///
    /// - `Next` from a Program skips it; when every Program said `Next`,
    ///   so does the entry.
    /// - `Done` stops the remaining Programs, successfully.
    /// - `Fail`/`Error` propagate.
    /// - Once a Program with a `case` step was selected, later `case`
    ///   Programs are skipped.
    pub fn traverse(self: &Arc<Self>, ctx: &Arc<Context>, inv: Invocation) -> BoxFuture<'static, Flow<Outcome>> {
        let entry = Arc::clone(self);
        let ctx = Arc::clone(ctx);
        Box::pin(async move { entry.traverse_inner(ctx, inv).await })
    }

    async fn traverse_inner(self: Arc<Self>, ctx: Arc<Context>, inv: Invocation) -> Flow<Outcome> {
        let target_path = inv.target.as_file().map(|f| f.path());
        let name = inv.target.strval();
        let held = inv.caller.as_ref().map(|c| c.held_paths()).unwrap_or_default();

        // Recursion through the same target would deadlock on its own lock;
        // the recursion guard ends it instead.
        let _guard = match &target_path {
            Some(path) if !held.contains(path) => Some(lock_target(&ctx, &held, path, &name).await?),
            _ => None,
        };

        if let Some(path) = &target_path {
            if ctx.is_updated(path) {
                debug!(goal = %name, "already updated in this run");
                return Ok(Outcome {
                    target: restat(&inv.target),
                    updated: true,
                    results: Vec::new(),
                });
            }
        }

        let programs = self.programs();
        let mut results = Vec::new();
        let mut updated = false;
        let mut ran = false;
        let mut case_taken = false;

        for program in &programs {
            if case_taken && program.has_case() {
                continue;
            }
            match program.execute(&ctx, &self, inv.clone()).await {
                Ok(out) => {
                    ran = true;
                    updated |= out.updated;
                    case_taken |= out.case;
                    results.push(out.value);
                }
                Err(b) => match b.kind {
                    BreakKind::Next => continue,
                    BreakKind::Done | BreakKind::Case => {
                        ran = true;
                        break;
                    }
                    BreakKind::Fail | BreakKind::Error | BreakKind::Unknown => return Err(b),
                },
            }
        }

        if !ran && !programs.is_empty() {
            return Err(Breaker::next());
        }

        if updated {
            if let Some(path) = target_path {
                ctx.mark_updated(path);
            }
        }

        Ok(Outcome {
            target: restat(&inv.target),
            updated,
            results,
        })
    }

    /// Traverse and split the result into values and breakers.
    pub async fn execute(self: &Arc<Self>, ctx: &Arc<Context>, inv: Invocation) -> (Vec<Value>, Vec<Breaker>) {
        match self.traverse(ctx, inv).await {
            Ok(outcome) => (outcome.results, Vec::new()),
            Err(b) => (Vec::new(), vec![b]),
        }
    }
}

/// Take the traversal lock of `path`, refusing waits that close a cycle
/// with sibling branches.
async fn lock_target(
    ctx: &Context,
    held: &[PathBuf],
    path: &Path,
    name: &str,
) -> Flow<OwnedMutexGuard<()>> {
    let file_lock = ctx.file_lock(path);
    if let Ok(guard) = Arc::clone(&file_lock).try_lock_owned() {
        return Ok(guard);
    }
    if let Some(closing) = ctx.begin_wait(held, path) {
        let err = RuleError::DependencyCycle {
            target: name.to_string(),
            held: closing.display().to_string(),
        };
        return Err(Breaker::fail(err.to_string()));
    }
    let guard = file_lock.lock_owned().await;
    ctx.end_wait(held, path);
    Ok(guard)
}

fn restat(target: &Value) -> Value {
    match target {
        Value::File(f) => {
            let mut f = f.clone();
            f.stat();
            Value::File(f)
        }
        other => other.clone(),
    }
}
