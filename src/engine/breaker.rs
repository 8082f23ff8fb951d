// src/engine/breaker.rs

//! Control-flow signals.
//!
//! A [`Breaker`] is not a value: it travels upward in the `Err` side of a
//! [`Flow`] from a modifier to its group, from the group to the Program and
//! from the Program to its rule entry. Who intercepts which kind:
//!
//! | kind  | intercepted by                                            |
//! |-------|-----------------------------------------------------------|
//! | Done  | the modifier group (scope `Group`) or the entry (`Traversal`) |
//! | Next  | the modifier group, then the entry skips the Program      |
//! | Case  | the modifier group, recorded as the selected case         |
//! | Fail  | nobody, aborts every Program up the chain                 |
//! | Error | nobody, like `Fail` but wraps a real error                |

use std::fmt;
use std::sync::Arc;

use crate::errors::RuleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    Unknown,
    Done,
    Next,
    Case,
    Fail,
    Error,
}

/// How far a `Done` reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakScope {
    /// The current modifier group.
    Group,
    /// The whole traversal of the target (all Programs of the entry).
    Traversal,
}

#[derive(Debug, Clone)]
pub struct Breaker {
    pub kind: BreakKind,
    pub scope: BreakScope,
    pub message: String,
    pub error: Option<Arc<RuleError>>,
    /// Already pushed to the diagnostics sink.
    pub reported: bool,
}

pub type Flow<T> = std::result::Result<T, Breaker>;

impl Breaker {
    fn new(kind: BreakKind, scope: BreakScope, message: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            message: message.into(),
            error: None,
            reported: false,
        }
    }

    pub fn done(scope: BreakScope) -> Self {
        Self::new(BreakKind::Done, scope, "")
    }

    pub fn next() -> Self {
        Self::new(BreakKind::Next, BreakScope::Group, "")
    }

    pub fn case(message: impl Into<String>) -> Self {
        Self::new(BreakKind::Case, BreakScope::Group, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(BreakKind::Fail, BreakScope::Traversal, message)
    }

    pub fn error(err: RuleError) -> Self {
        let mut b = Self::new(BreakKind::Error, BreakScope::Traversal, err.to_string());
        b.error = Some(Arc::new(err));
        b
    }

    /// `Fail` and `Error` abort the owning Program.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, BreakKind::Fail | BreakKind::Error)
    }

    pub fn reported(mut self) -> Self {
        self.reported = true;
        self
    }
}

impl From<RuleError> for Breaker {
    fn from(err: RuleError) -> Self {
        Breaker::error(err)
    }
}

impl fmt::Display for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            BreakKind::Unknown => "unknown",
            BreakKind::Done => "done",
            BreakKind::Next => "next",
            BreakKind::Case => "case",
            BreakKind::Fail => "fail",
            BreakKind::Error => "error",
        };
        if self.message.is_empty() {
            f.write_str(kind)
        } else {
            write!(f, "{kind}: {}", self.message)
        }
    }
}
