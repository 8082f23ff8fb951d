// src/modifier/mod.rs

//! Modifier pipeline.
//!
//! A modifier group is an ordered list of named steps run inside a Program.
//! Each step either returns the new result buffer or raises a breaker:
//!
//! - `Done` with group scope ends the group successfully,
//! - `Next` ends the group and lets the rule entry move to its next Program,
//! - `Case` records the selected case and continues,
//! - `Fail`/`Error` abort.

pub mod dirty;
pub mod fileio;
pub mod grep;
pub mod interp;
pub mod predict;
pub mod visit;

use tracing::debug;

use crate::engine::breaker::{BreakKind, BreakScope, Breaker, Flow};
use crate::engine::traversal::Traversal;
use crate::value::Value;

/// Every modifier name a rule may use.
pub const KNOWN: &[&str] = &[
    "cd",
    "check",
    "assert",
    "cond",
    "case",
    "once",
    "target-1st-visit",
    "target-max-visit",
    "dirty",
    "grep-files",
    "write-file",
    "append-file",
    "use",
    "shell",
    "plain",
];

pub fn is_known(name: &str) -> bool {
    KNOWN.contains(&name)
}

pub fn is_interpreter(name: &str) -> bool {
    matches!(name, "shell" | "plain")
}

/// Steps that inspect or consume what the recipes produced.
pub fn is_post_step(name: &str) -> bool {
    matches!(name, "check" | "write-file" | "append-file" | "grep-files")
}

/// A modifier and its unevaluated arguments.
#[derive(Debug, Clone)]
pub struct ModifierCall {
    pub name: String,
    pub args: Vec<Value>,
}

impl ModifierCall {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// How a group ended without aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEnd {
    Completed,
    /// A step decided the rest of the group is not needed.
    Done,
    /// The Program does not apply; try the next one.
    Next,
}

pub async fn run_group(t: &mut Traversal, calls: &[ModifierCall]) -> Flow<GroupEnd> {
    for call in calls {
        match apply(t, call).await {
            Ok(value) => t.set_buffer(value)?,
            Err(b) => match (b.kind, b.scope) {
                (BreakKind::Done, BreakScope::Group) => {
                    debug!(goal = %t.target_name(), modifier = %call.name, "group done");
                    return Ok(GroupEnd::Done);
                }
                (BreakKind::Next, _) => return Ok(GroupEnd::Next),
                (BreakKind::Case, _) => {
                    debug!(goal = %t.target_name(), case = %b.message, "case selected");
                    t.case_selected = true;
                }
                _ => return Err(b),
            },
        }
    }
    Ok(GroupEnd::Completed)
}

async fn apply(t: &mut Traversal, call: &ModifierCall) -> Flow<Value> {
    let mut evaluated = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        evaluated.push(t.eval(arg).await?);
    }
    let args = Args::new(evaluated);

    match call.name.as_str() {
        "cd" => fileio::cd(t, &args),
        "check" => predict::check(t, &args),
        "assert" => predict::assert(t, &args),
        "cond" => predict::cond(t, &args),
        "case" => predict::case(t, &args),
        "once" => visit::once(t, &args),
        "target-1st-visit" => visit::first_visit(t),
        "target-max-visit" => visit::max_visit(t, &args),
        "dirty" => dirty::dirty(t, &args),
        "grep-files" => grep::grep_files(t, &args),
        "write-file" => fileio::write_file(t, &args, false),
        "append-file" => fileio::write_file(t, &args, true),
        "use" => interp::use_rule(t, &args).await,
        "shell" => interp::shell(t, &args).await,
        "plain" => interp::plain(t).await,
        other => Err(Breaker::fail(format!("unknown modifier '{other}'"))),
    }
}

/// Evaluated modifier arguments, split by shape.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// `-name`
    pub flags: Vec<String>,
    /// `-name=value`
    pub options: Vec<(String, Value)>,
    /// `key=value`
    pub pairs: Vec<(String, Value)>,
    /// Everything else, in order.
    pub items: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        let mut args = Self::default();
        for value in values {
            match value {
                Value::Flag(name) => args.flags.push(name),
                Value::Pair(k, v) => match *k {
                    Value::Flag(name) => args.options.push((name, *v)),
                    key => args.pairs.push((key.strval(), *v)),
                },
                other => args.items.push(other),
            }
        }
        args
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f == name)
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Positional items as words.
    pub fn words(&self) -> Vec<String> {
        self.items
            .iter()
            .flat_map(|v| {
                v.strval()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
