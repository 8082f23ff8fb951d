// src/modifier/dirty.rs

//! `dirty [-checksum]`: decide whether the target needs rebuilding.

use std::fmt;

use tracing::{debug, info};

use crate::engine::breaker::{BreakKind, BreakScope, Breaker, Flow};
use crate::engine::traversal::Traversal;
use crate::state::compute_file_hash;
use crate::value::{File, Value};

use super::Args;

/// Why a target is out of date, in the order the reasons are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtyReason {
    /// A prerequisite raised a non-case breaker.
    Breakers,
    /// The target is phony, not a file, or does not exist.
    Missing,
    PrerequisiteUpdated(String),
    PrerequisiteNewer(String),
    /// Content differs from the hash stored after the last build.
    Checksum,
    RecipeChanged,
}

impl fmt::Display for DirtyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirtyReason::Breakers => write!(f, "prerequisites failed"),
            DirtyReason::Missing => write!(f, "target is missing"),
            DirtyReason::PrerequisiteUpdated(name) => write!(f, "'{name}' was updated"),
            DirtyReason::PrerequisiteNewer(name) => write!(f, "'{name}' is newer"),
            DirtyReason::Checksum => write!(f, "content changed"),
            DirtyReason::RecipeChanged => write!(f, "recipe changed"),
        }
    }
}

pub fn dirty_reason(t: &Traversal, checksum: bool) -> Option<DirtyReason> {
    if t.breakers.iter().any(|b| b.kind != BreakKind::Case) {
        return Some(DirtyReason::Breakers);
    }
    if t.entry.is_phony() {
        return Some(DirtyReason::Missing);
    }
    let Some(target) = t.target_file() else {
        return Some(DirtyReason::Missing);
    };
    // Another Program of the same entry may have written it already.
    let mut target: File = target.clone();
    target.stat();
    if !target.exists() {
        return Some(DirtyReason::Missing);
    }

    if let Some(first) = t.updated.first() {
        return Some(DirtyReason::PrerequisiteUpdated(display_name(first)));
    }
    let newer = t
        .depends
        .iter()
        .chain(&t.grepped)
        .filter_map(Value::as_file)
        .find(|f| f.newer_than(&target));
    if let Some(file) = newer {
        return Some(DirtyReason::PrerequisiteNewer(file.logical()));
    }

    let key = target.path().display().to_string();
    if checksum {
        if let Some(stored) = t.ctx.load_hash(&format!("content:{key}")) {
            match compute_file_hash(&target.path()) {
                Ok(current) if current == stored => {}
                Ok(_) => return Some(DirtyReason::Checksum),
                Err(err) => {
                    debug!(goal = %key, error = %err, "cannot hash target");
                    return Some(DirtyReason::Checksum);
                }
            }
        }
    }
    if let Some(stored) = t.ctx.load_hash(&format!("recipe:{key}")) {
        if stored != t.program.recipe_hash() {
            return Some(DirtyReason::RecipeChanged);
        }
    }
    None
}

fn display_name(value: &Value) -> String {
    match value {
        Value::File(f) => f.logical(),
        other => other.strval(),
    }
}

/// Continue when the target is out of date, otherwise end the group.
pub fn dirty(t: &mut Traversal, args: &Args) -> Flow<Value> {
    match dirty_reason(t, args.flag("checksum")) {
        Some(reason) => {
            info!(goal = %t.target_name(), reason = %reason, "target is out of date");
            Ok(t.buffer.clone())
        }
        None => {
            debug!(goal = %t.target_name(), "target is up to date");
            Err(Breaker::done(BreakScope::Group))
        }
    }
}
