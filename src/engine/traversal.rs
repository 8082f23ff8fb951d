// src/engine/traversal.rs

//! Per-invocation execution state.
//!
//! A [`Traversal`] is created fresh for every Program execution. Automatic
//! variables live in a frame scope of their own (a child of the Program
//! scope), so nested or concurrent executions of the same Program never see
//! each other's bindings.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::breaker::{Breaker, Flow};
use crate::engine::context::Context;
use crate::engine::dirstack::DirStack;
use crate::engine::program::Program;
use crate::errors::RuleError;
use crate::exec::ExecResult;
use crate::project::{Project, RuleEntry};
use crate::scope::{Def, Lookup, Scope};
use crate::types::{DefOrigin, Position};
use crate::value::{File, Value};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// References followed while evaluating a single value.
const MAX_EVAL_DEPTH: usize = 64;

/// One link of the caller chain.
#[derive(Debug)]
pub struct Frame {
    pub program: u64,
    pub target: String,
    /// Path of the target when it is a file.
    pub path: Option<PathBuf>,
    pub caller: Option<Arc<Frame>>,
}

impl Frame {
    fn chain(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(Some(self), |f| f.caller.as_deref())
    }

    /// Occurrences of `program` on the chain, this frame included.
    pub fn count_program(&self, program: u64) -> usize {
        self.chain().filter(|f| f.program == program).count()
    }

    pub fn has_target(&self, target: &str) -> bool {
        self.chain().any(|f| f.target == target)
    }

    /// File paths on the chain; their locks are held while this frame runs.
    pub fn held_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.chain().filter_map(|f| f.path.clone()).collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Occurrences of `target` on the chain, this frame included.
    pub fn count_target(&self, target: &str) -> usize {
        self.chain().filter(|f| f.target == target).count()
    }
}

/// What a rule entry is asked to do.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub target: Value,
    pub stems: Vec<String>,
    pub args: Vec<Value>,
    pub caller: Option<Arc<Frame>>,
}

impl Invocation {
    /// A top-level request without caller.
    pub fn root(target: Value, stems: Vec<String>) -> Self {
        Self {
            target,
            stems,
            args: Vec::new(),
            caller: None,
        }
    }
}

pub struct Traversal {
    pub ctx: Arc<Context>,
    pub project: Arc<Project>,
    pub program: Arc<Program>,
    pub entry: Arc<RuleEntry>,
    pub frame: Arc<Frame>,
    /// Holds the automatic variables and parameters.
    pub scope: Arc<Scope>,
    pub target: Value,
    pub stems: Vec<String>,
    pub args: Vec<Value>,
    pub depends: Vec<Value>,
    pub ordered: Vec<Value>,
    pub grepped: Vec<Value>,
    /// Prerequisites rebuilt during this traversal.
    pub updated: Vec<Value>,
    pub breakers: Vec<Breaker>,
    pub buffer: Value,
    pub last_exec: Option<ExecResult>,
    pub dirs: DirStack,
    pub target_updated: bool,
    pub case_selected: bool,
}

impl Traversal {
    pub fn new(
        ctx: Arc<Context>,
        project: Arc<Project>,
        program: Arc<Program>,
        entry: Arc<RuleEntry>,
        inv: Invocation,
    ) -> Flow<Self> {
        let frame = Arc::new(Frame {
            program: program.id(),
            target: inv.target.strval(),
            path: inv.target.as_file().map(|f| f.path()),
            caller: inv.caller,
        });
        let scope = program.scope().child(format!("{}#{}", entry.name(), program.id()));
        let dirs = DirStack::new(project.dir());

        let t = Self {
            ctx,
            project,
            program,
            entry,
            frame,
            scope,
            target: inv.target,
            stems: inv.stems,
            args: inv.args,
            depends: Vec::new(),
            ordered: Vec::new(),
            grepped: Vec::new(),
            updated: Vec::new(),
            breakers: Vec::new(),
            buffer: Value::None,
            last_exec: None,
            dirs,
            target_updated: false,
            case_selected: false,
        };

        t.bind("@", t.target.clone())?;
        let stem = match t.stems.as_slice() {
            [] => Value::None,
            [one] => Value::str(one.clone()),
            many => Value::List(many.iter().cloned().map(Value::Str).collect()),
        };
        t.bind("*", stem)?;
        t.bind_params()?;
        Ok(t)
    }

    /// Parameters from named (`key=value`) and positional arguments, falling
    /// back to the declared default.
    fn bind_params(&self) -> Flow<()> {
        let mut positional = self
            .args
            .iter()
            .filter(|a| !matches!(a, Value::Pair(..) | Value::Flag(_)));
        for param in self.program.params() {
            let named = self.args.iter().find_map(|a| match a {
                Value::Pair(k, v) if k.strval() == param.name => Some((**v).clone()),
                _ => None,
            });
            let value = named
                .or_else(|| positional.next().cloned())
                .unwrap_or_else(|| param.default.clone());
            self.scope.replace(&param.name, DefOrigin::Arg, value)?;
        }
        Ok(())
    }

    /// Bind an automatic variable.
    pub fn bind(&self, name: &str, value: Value) -> Flow<()> {
        self.scope.replace(name, DefOrigin::Auto, value)?;
        Ok(())
    }

    /// Bind `< ^ | ~ ?` from the dispatched prerequisites.
    pub fn bind_prerequisites(&self) -> Flow<()> {
        self.bind("<", self.depends.first().cloned().unwrap_or_default())?;
        self.bind("^", Value::List(self.depends.clone()))?;
        self.bind("|", Value::List(self.ordered.clone()))?;
        self.bind("~", Value::List(self.grepped.clone()))?;
        self.bind("?", Value::List(self.updated.clone()))?;
        self.bind("-", self.buffer.clone())
    }

    pub fn set_buffer(&mut self, value: Value) -> Flow<()> {
        self.buffer = value;
        self.bind("-", self.buffer.clone())
    }

    pub fn target_file(&self) -> Option<&File> {
        self.target.as_file()
    }

    /// Target name for messages: the logical name of a file target.
    pub fn target_name(&self) -> String {
        match &self.target {
            Value::File(f) => f.logical(),
            other => other.strval(),
        }
    }

    pub fn position(&self) -> Position {
        self.program.position().clone()
    }

    /// Evaluate `value`: expand references and run nested invocations.
    pub fn eval<'a>(&'a self, value: &'a Value) -> BoxFuture<'a, Flow<Value>> {
        self.eval_depth(value, 0)
    }

    pub async fn eval_text(&self, value: &Value) -> Flow<String> {
        Ok(self.eval(value).await?.strval())
    }

    fn eval_depth<'a>(&'a self, value: &'a Value, depth: usize) -> BoxFuture<'a, Flow<Value>> {
        Box::pin(async move {
            match value {
                Value::Ref(name) => {
                    if depth >= MAX_EVAL_DEPTH {
                        return Err(RuleError::CyclicBinding { name: name.clone() }.into());
                    }
                    let def = self
                        .find_def(name)
                        .ok_or_else(|| RuleError::Undefined { name: name.clone() })?;
                    let bound = def.value();
                    self.eval_depth(&bound, depth + 1).await
                }
                Value::Compound(parts) => {
                    let mut text = String::new();
                    for part in parts {
                        text.push_str(&self.eval_depth(part, depth).await?.strval());
                    }
                    Ok(Value::Str(text))
                }
                Value::List(items) => Ok(Value::List(self.eval_all(items, depth).await?)),
                Value::Group(items) => Ok(Value::Group(self.eval_all(items, depth).await?)),
                Value::Pair(k, v) => Ok(Value::Pair(
                    Box::new(self.eval_depth(k, depth).await?),
                    Box::new(self.eval_depth(v, depth).await?),
                )),
                Value::Invoke { target, args } => self.invoke(target, args, depth).await,
                other => Ok(other.clone()),
            }
        })
    }

    async fn eval_all(&self, items: &[Value], depth: usize) -> Flow<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.eval_depth(item, depth).await?);
        }
        Ok(out)
    }

    /// `$(=> target args...)`: traverse another rule with this traversal as
    /// caller and return its result buffer.
    async fn invoke(&self, target: &Value, args: &[Value], depth: usize) -> Flow<Value> {
        let name = self.eval_depth(target, depth).await?.strval();
        let args = self.eval_all(args, depth).await?;
        let goal = self
            .project
            .resolve_goal(&name)
            .ok_or(RuleError::NoRule { target: name })?;

        let inv = Invocation {
            target: goal.target,
            stems: goal.stems,
            args,
            caller: Some(Arc::clone(&self.frame)),
        };
        let (mut results, breakers) = goal.entry.execute(&self.ctx, inv).await;
        if let Some(b) = breakers.into_iter().find(Breaker::is_fatal) {
            return Err(b);
        }
        Ok(match results.len() {
            0 => Value::None,
            1 => results.pop().unwrap_or_default(),
            _ => Value::List(results),
        })
    }
}

impl Lookup for Traversal {
    /// Frame scope, then the Program scope, then the owning project.
    fn find_def(&self, name: &str) -> Option<Arc<Def>> {
        if !name.contains("::") {
            if let Some(def) = self.scope.find_def_local(name) {
                return Some(def);
            }
            if let Some(def) = self.program.scope().find_def_local(name) {
                return Some(def);
            }
        }
        self.project.find_def(name)
    }
}
