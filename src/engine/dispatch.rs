// src/engine/dispatch.rs

//! Prerequisite dispatch.
//!
//! Each prerequisite group (normal, order-only, grepped) is resolved to rule
//! entries or plain files, the rule traversals are spawned into a `JoinSet`
//! and joined before the next group starts. A failing prerequisite does not
//! interrupt its siblings: they are joined and their results discarded.

use std::path::PathBuf;

use tokio::task::JoinSet;
use tracing::debug;

use crate::engine::breaker::{Breaker, Flow};
use crate::engine::traversal::{Invocation, Traversal};
use crate::errors::RuleError;
use crate::pattern::{Pattern, PatternKind};
use crate::project::Realized;
use crate::value::{File, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrereqKind {
    Normal,
    OrderOnly,
    Grepped,
}

/// A prerequisite before resolution.
#[derive(Debug, Clone)]
enum Prereq {
    Name(String),
    File(File),
}

enum Resolved {
    Rule(Realized),
    File(File),
    Missing(String),
}

/// Traverse all prerequisites of `t` and record them on it.
pub async fn dispatch_prerequisites(t: &mut Traversal) -> Flow<()> {
    let program = t.program.clone();

    let names = expand(t, program.depends()).await?;
    let (depends, updated, nexts) = traverse_group(t, names, PrereqKind::Normal).await?;
    t.depends = depends;
    t.updated.extend(updated);
    t.breakers.extend(nexts);

    let names = expand(t, program.ordered()).await?;
    let (ordered, _, nexts) = traverse_group(t, names, PrereqKind::OrderOnly).await?;
    t.ordered = ordered;
    t.breakers.extend(nexts);

    let names = grepped(t);
    let (grepped, updated, nexts) = traverse_group(t, names, PrereqKind::Grepped).await?;
    t.grepped = grepped;
    t.updated.extend(updated);
    t.breakers.extend(nexts);

    Ok(())
}

/// Evaluate prerequisite values into names.
///
/// `%` patterns are stenciled with the traversal's stems; glob patterns are
/// replaced by the files they match.
async fn expand(t: &Traversal, values: &[Value]) -> Flow<Vec<Prereq>> {
    let mut out = Vec::new();
    for value in values {
        let evaluated = t.eval(value).await?;
        for item in evaluated.items() {
            if let Value::File(f) = item {
                out.push(Prereq::File(f));
                continue;
            }
            for word in item.strval().split_whitespace() {
                let mut name = word.to_string();
                if matches!(Pattern::classify(&name), Some(PatternKind::Percent | PatternKind::Path)) {
                    name = Pattern::parse(&name)?.stencil(&t.stems).text;
                }
                if Pattern::classify(&name) == Some(PatternKind::Glob) {
                    let files = t.project.wildcard(&[name])?;
                    out.extend(files.into_iter().map(Prereq::File));
                    continue;
                }
                out.push(Prereq::Name(name));
            }
        }
    }
    Ok(out)
}

/// Grepped dependencies recorded for the target by an earlier run.
fn grepped(t: &Traversal) -> Vec<Prereq> {
    let Some(target) = t.target_file() else {
        return Vec::new();
    };
    let Some(entries) = t.ctx.grep_cache().get(&target.path()) else {
        return Vec::new();
    };
    entries
        .into_iter()
        .map(|e| Prereq::File(File::locate(PathBuf::from(&e.dir), &e.sub, &e.name)))
        .collect()
}

fn resolve(t: &Traversal, prereq: Prereq) -> Resolved {
    match prereq {
        Prereq::Name(name) => {
            if let Some(goal) = t.project.resolve_goal(&name) {
                return Resolved::Rule(goal);
            }
            let file = t.project.resolve_file(&name);
            if file.exists() {
                Resolved::File(file)
            } else {
                Resolved::Missing(name)
            }
        }
        Prereq::File(file) => {
            if let Some(mut goal) = t.project.resolve_goal(&file.logical()) {
                if !goal.entry.is_phony() {
                    goal.target = Value::File(file);
                }
                return Resolved::Rule(goal);
            }
            if file.exists() {
                Resolved::File(file)
            } else {
                Resolved::Missing(file.logical())
            }
        }
    }
}

type GroupResult = (Vec<Value>, Vec<Value>, Vec<Breaker>);

/// Traverse one prerequisite group concurrently and join it.
///
/// Returns the prerequisites in declaration order, those that were updated,
/// and the non-fatal breakers raised by their rules.
async fn traverse_group(t: &Traversal, prereqs: Vec<Prereq>, kind: PrereqKind) -> Flow<GroupResult> {
    let mut slots: Vec<Option<(Value, bool)>> = vec![None; prereqs.len()];
    let mut set = JoinSet::new();
    let mut fatal: Option<Breaker> = None;

    for (i, prereq) in prereqs.into_iter().enumerate() {
        if fatal.is_some() {
            break;
        }
        match resolve(t, prereq) {
            Resolved::Rule(goal) => {
                slots[i] = Some((goal.target.clone(), false));
                let inv = Invocation {
                    target: goal.target,
                    stems: goal.stems,
                    args: Vec::new(),
                    caller: Some(t.frame.clone()),
                };
                let fut = goal.entry.traverse(&t.ctx, inv);
                set.spawn(async move { (i, fut.await) });
            }
            Resolved::File(file) => slots[i] = Some((Value::File(file), false)),
            Resolved::Missing(name) if kind == PrereqKind::Grepped => {
                debug!(goal = %t.target_name(), dependency = %name, "grepped dependency is gone");
            }
            Resolved::Missing(name) => {
                let err = RuleError::NoRule { target: name };
                t.ctx.diagnostics().error(t.position(), err.to_string());
                fatal = Some(Breaker::fail(err.to_string()).reported());
            }
        }
    }

    let mut nexts = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((i, Ok(outcome))) => slots[i] = Some((outcome.target, outcome.updated)),
            Ok((_, Err(b))) if b.is_fatal() => {
                fatal.get_or_insert(b);
            }
            Ok((_, Err(b))) => nexts.push(b),
            Err(err) => {
                fatal.get_or_insert(RuleError::Other(err.into()).into());
            }
        }
    }
    if let Some(b) = fatal {
        return Err(b);
    }

    let mut values = Vec::new();
    let mut updated = Vec::new();
    for (value, was_updated) in slots.into_iter().flatten() {
        if was_updated {
            updated.push(value.clone());
        }
        values.push(value);
    }
    Ok((values, updated, nexts))
}
