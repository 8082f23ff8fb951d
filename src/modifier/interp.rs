// src/modifier/interp.rs

//! Interpreters (`shell`, `plain`) and `use`.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::breaker::{BreakKind, Breaker, Flow};
use crate::engine::traversal::{Invocation, Traversal};
use crate::exec::{ExecResult, RecipeJob};
use crate::value::Value;

use super::Args;

async fn recipe_lines(t: &Traversal) -> Flow<Vec<String>> {
    let mut lines = Vec::new();
    for recipe in t.program.recipes() {
        let text = t.eval_text(recipe).await?;
        lines.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    Ok(lines)
}

/// `shell [-i] [-s]`: run each recipe line with `sh -c` in the current
/// directory. `-i` ignores failing commands, `-s` does not echo them.
pub async fn shell(t: &mut Traversal, args: &Args) -> Flow<Value> {
    let ignore = args.flag("i");
    let silent = args.flag("s");
    let name = t.target_name();
    let lines = recipe_lines(t).await?;

    let mut last: Option<ExecResult> = None;
    for line in lines {
        if !silent || t.ctx.dry_run() {
            println!("{line}");
        }
        if t.ctx.dry_run() {
            continue;
        }

        let job = RecipeJob {
            target: name.clone(),
            command: line,
            dir: t.dirs.current().to_path_buf(),
        };
        let result = {
            let _permit = t.ctx.acquire_job().await?;
            t.ctx.executor().run(job).await?
        };
        print!("{}", result.stdout);
        let _ = std::io::stdout().flush();

        let failed = !result.success();
        t.last_exec = Some(result.clone());
        if failed {
            if !ignore {
                return Err(Breaker::fail(format!(
                    "recipe for '{name}' failed with exit status {}",
                    result.status
                )));
            }
            debug!(goal = %name, status = result.status, "ignoring failed command");
        }
        last = Some(result);
    }

    t.target_updated = true;
    Ok(match last {
        Some(result) => Value::Exec(result),
        None => t.buffer.clone(),
    })
}

/// `plain`: the evaluated recipes become the result buffer.
pub async fn plain(t: &mut Traversal) -> Flow<Value> {
    let mut parts = Vec::new();
    for recipe in t.program.recipes() {
        parts.push(t.eval_text(recipe).await?);
    }
    Ok(Value::Str(parts.join("\n")))
}

/// `use NAME [args...]`: run the Programs of a use rule for the current
/// target, as if they were part of this one.
pub async fn use_rule(t: &mut Traversal, args: &Args) -> Flow<Value> {
    let Some(first) = args.items.first() else {
        return Err(Breaker::fail("use needs a rule name"));
    };
    let name = first.strval();
    let entry = t
        .project
        .resolve_use(&name)
        .ok_or_else(|| Breaker::fail(format!("no use rule '{name}'")))?;

    let mut forwarded: Vec<Value> = args.items[1..].to_vec();
    forwarded.extend(
        args.pairs
            .iter()
            .map(|(k, v)| Value::Pair(Box::new(Value::str(k.clone())), Box::new(v.clone()))),
    );

    info!(goal = %t.target_name(), rule = %name, "using rule");
    for program in entry.programs() {
        let inv = Invocation {
            target: t.target.clone(),
            stems: t.stems.clone(),
            args: forwarded.clone(),
            caller: Some(Arc::clone(&t.frame)),
        };
        match program.execute(&t.ctx, &entry, inv).await {
            Ok(out) => {
                t.target_updated |= out.updated;
                t.buffer = out.value;
            }
            Err(b) => match b.kind {
                BreakKind::Next => continue,
                BreakKind::Done | BreakKind::Case => break,
                BreakKind::Fail | BreakKind::Error | BreakKind::Unknown => return Err(b),
            },
        }
    }
    Ok(t.buffer.clone())
}
