// src/engine/program.rs

//! One executable clause of a rule.
//!
//! `Program::execute` runs the state machine:
//!
//! 1. recursion guard and already-updated short-circuit,
//! 2. bind `@`, `*` and parameters in a fresh frame scope,
//! 3. traverse normal, then order-only, then grepped prerequisites, each
//!    group concurrently with a join point,
//! 4. bind `< ^ | ~ ?`,
//! 5. run the modifier pipeline,
//! 6. store hashes of an updated target and leave entered directories.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, info};

use crate::engine::breaker::{BreakKind, Breaker, Flow};
use crate::engine::context::Context;
use crate::engine::dispatch;
use crate::engine::traversal::{BoxFuture, Invocation, Traversal};
use crate::errors::RuleError;
use crate::modifier::{self, GroupEnd, ModifierCall};
use crate::project::{Project, RuleEntry};
use crate::scope::Scope;
use crate::state::{compute_file_hash, compute_text_hash};
use crate::types::{Language, Position};
use crate::value::Value;

/// Nested executions of one Program allowed on a caller chain.
pub const MAX_RECURSION: usize = 16;

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Value,
}

/// Declaration data of a Program.
#[derive(Debug, Clone, Default)]
pub struct ProgramSpec {
    pub params: Vec<Param>,
    pub depends: Vec<Value>,
    pub ordered: Vec<Value>,
    pub recipes: Vec<Value>,
    pub modifiers: Vec<ModifierCall>,
    pub language: Language,
    pub position: Position,
}

/// What one Program execution produced.
#[derive(Debug, Clone)]
pub struct ProgramOutcome {
    pub value: Value,
    pub updated: bool,
    /// A `case` step selected this Program.
    pub case: bool,
}

pub struct Program {
    id: u64,
    project: Weak<Project>,
    scope: Arc<Scope>,
    spec: ProgramSpec,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("position", &self.spec.position)
            .finish_non_exhaustive()
    }
}

impl Program {
    pub fn new(project: &Arc<Project>, spec: ProgramSpec) -> Arc<Self> {
        let id = NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed);
        let scope = project.scope().child(format!("program#{id}"));
        Arc::new(Self {
            id,
            project: Arc::downgrade(project),
            scope,
            spec,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Scope of program-level variables.
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn params(&self) -> &[Param] {
        &self.spec.params
    }

    pub fn depends(&self) -> &[Value] {
        &self.spec.depends
    }

    pub fn ordered(&self) -> &[Value] {
        &self.spec.ordered
    }

    pub fn recipes(&self) -> &[Value] {
        &self.spec.recipes
    }

    pub fn modifiers(&self) -> &[ModifierCall] {
        &self.spec.modifiers
    }

    pub fn language(&self) -> Language {
        self.spec.language
    }

    pub fn position(&self) -> &Position {
        &self.spec.position
    }

    pub fn has_case(&self) -> bool {
        self.spec.modifiers.iter().any(|m| m.name == "case")
    }

    /// Hash of the recipe source text.
    pub fn recipe_hash(&self) -> String {
        compute_text_hash(self.spec.recipes.iter().map(Value::strval))
    }

    /// The modifier pipeline actually run.
    ///
    /// Without an explicit interpreter, the Program's language interpreter
    /// runs the recipes right before the first post-build step (`check`,
    /// `write-file`, `append-file`, `grep-files`). For file targets, an
    /// implicit `dirty` goes in front of the interpreter.
    pub fn pipeline(&self, file_target: bool) -> Vec<ModifierCall> {
        let mut calls = self.spec.modifiers.clone();
        if self.spec.recipes.is_empty() {
            return calls;
        }

        let interp_at = match calls.iter().position(|c| modifier::is_interpreter(&c.name)) {
            Some(i) => i,
            None => {
                let at = calls
                    .iter()
                    .position(|c| modifier::is_post_step(&c.name))
                    .unwrap_or(calls.len());
                calls.insert(at, ModifierCall::new(self.spec.language.modifier_name(), Vec::new()));
                at
            }
        };

        if file_target && !calls.iter().any(|c| c.name == "dirty") {
            calls.insert(interp_at, ModifierCall::new("dirty", Vec::new()));
        }
        calls
    }

    /// Execute this Program for one invocation of `entry`.
    pub fn execute(
        self: &Arc<Self>,
        ctx: &Arc<Context>,
        entry: &Arc<RuleEntry>,
        inv: Invocation,
    ) -> BoxFuture<'static, Flow<ProgramOutcome>> {
        let program = Arc::clone(self);
        let ctx = Arc::clone(ctx);
        let entry = Arc::clone(entry);
        Box::pin(async move {
            let position = program.position().clone();
            let result = program.run(Arc::clone(&ctx), entry, inv).await;
            result.map_err(|b| report(&ctx, position, b))
        })
    }

    async fn run(self: Arc<Self>, ctx: Arc<Context>, entry: Arc<RuleEntry>, inv: Invocation) -> Flow<ProgramOutcome> {
        let project = self.project.upgrade().ok_or_else(|| {
            RuleError::Config(format!("project of rule '{}' is gone", entry.name()))
        })?;
        let target_name = inv.target.strval();

        let depth = inv
            .caller
            .as_ref()
            .map_or(0, |c| c.count_program(self.id));
        if depth >= MAX_RECURSION {
            let err = RuleError::MaxRecursion {
                target: target_name,
                depth,
            };
            return Err(Breaker::fail(err.to_string()));
        }

        if let Some(file) = inv.target.as_file() {
            if ctx.is_updated(&file.path()) {
                debug!(goal = %target_name, "skipping, already updated");
                return Ok(ProgramOutcome {
                    value: inv.target.clone(),
                    updated: true,
                    case: false,
                });
            }
        }

        let mut t = Traversal::new(Arc::clone(&ctx), project, Arc::clone(&self), entry, inv)?;
        let result = self.run_traversal(&mut t).await;
        t.dirs.leave_all();
        let outcome = result?;

        if outcome.updated && !ctx.dry_run() {
            self.store_hashes(&t);
        }
        Ok(outcome)
    }

    async fn run_traversal(&self, t: &mut Traversal) -> Flow<ProgramOutcome> {
        dispatch::dispatch_prerequisites(t).await?;
        t.bind_prerequisites()?;

        let calls = self.pipeline(t.target_file().is_some() && !t.entry.is_phony());
        let end = modifier::run_group(t, &calls).await?;
        if end == GroupEnd::Next {
            return Err(Breaker::next());
        }

        Ok(ProgramOutcome {
            value: t.buffer.clone(),
            updated: t.target_updated,
            case: t.case_selected,
        })
    }

    fn store_hashes(&self, t: &Traversal) {
        let Some(file) = t.target_file() else {
            return;
        };
        let path = file.path();
        let key = path.display();
        if path.is_file() {
            match compute_file_hash(&path) {
                Ok(hash) => t.ctx.save_hash(&format!("content:{key}"), &hash),
                Err(err) => debug!(goal = %key, error = %err, "cannot hash target"),
            }
        }
        if !self.spec.recipes.is_empty() {
            t.ctx.save_hash(&format!("recipe:{key}"), &self.recipe_hash());
        }
        info!(goal = %t.target_name(), "target updated");
    }
}

/// Push an aborting breaker to the diagnostics sink once.
fn report(ctx: &Context, position: Position, b: Breaker) -> Breaker {
    if b.reported || !b.is_fatal() {
        return b;
    }
    match b.kind {
        BreakKind::Fail => ctx.diagnostics().fail(position, b.message.clone()),
        _ => ctx.diagnostics().error(position, b.message.clone()),
    }
    b.reported()
}
