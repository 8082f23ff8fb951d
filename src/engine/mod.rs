// src/engine/mod.rs

//! Rule traversal engine.
//!
//! This module ties together:
//! - [`program`]: executing one Program of a rule for one target,
//! - [`traversal`]: the per-invocation state (automatic variables, buffer,
//!   caller chain),
//! - [`dispatch`]: concurrent traversal of prerequisites,
//! - [`breaker`]: the control-flow signals modifiers raise,
//! - [`context`]: state shared by the whole run (jobs, updated targets,
//!   hashes, grep cache).

pub mod breaker;
pub mod context;
pub mod diagnostics;
pub mod dirstack;
pub mod dispatch;
pub mod program;
pub mod traversal;

pub use breaker::{BreakKind, BreakScope, Breaker, Flow};
pub use context::{Context, ContextOptions};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use program::{MAX_RECURSION, Param, Program, ProgramOutcome, ProgramSpec};
pub use traversal::{Frame, Invocation, Traversal};
