// src/modifier/visit.rs

//! Visit guards: `once`, `target-1st-visit`, `target-max-visit N`.
//!
//! Each ends the whole traversal (not just the group) when it trips.

use tracing::debug;

use crate::engine::breaker::{BreakScope, Breaker, Flow};
use crate::engine::traversal::Traversal;
use crate::state::compute_text_hash;
use crate::value::Value;

use super::Args;

/// Run at most once per run for the same target and arguments.
pub fn once(t: &Traversal, args: &Args) -> Flow<Value> {
    let key = once_key(t, args);
    if t.ctx.first_once(&key) {
        return Ok(t.buffer.clone());
    }
    debug!(goal = %t.target_name(), "already run once");
    Err(Breaker::done(BreakScope::Traversal))
}

fn once_key(t: &Traversal, args: &Args) -> String {
    let parts = std::iter::once(t.target.strval())
        .chain(t.args.iter().map(Value::strval))
        .chain(args.items.iter().map(Value::strval));
    format!("once:{}", compute_text_hash(parts))
}

/// Proceed only if the target is not already being traversed further up
/// the caller chain.
pub fn first_visit(t: &Traversal) -> Flow<Value> {
    let name = t.target.strval();
    if t.frame.count_target(&name) > 1 {
        debug!(goal = %t.target_name(), "target visited before on the caller chain");
        return Err(Breaker::done(BreakScope::Traversal));
    }
    Ok(t.buffer.clone())
}

/// Proceed for the first `N` visits of the target in this run.
pub fn max_visit(t: &Traversal, args: &Args) -> Flow<Value> {
    let limit = args
        .items
        .first()
        .and_then(Value::integer)
        .ok_or_else(|| Breaker::fail("target-max-visit needs a count"))?;
    let visits = t.ctx.visit(&format!("visit:{}", t.target.strval()));
    if visits as i64 > limit {
        debug!(goal = %t.target_name(), visits, limit, "visit limit reached");
        return Err(Breaker::done(BreakScope::Traversal));
    }
    Ok(t.buffer.clone())
}
