// src/engine/diagnostics.rs

//! Shared diagnostics sink.
//!
//! Problems are accumulated instead of thrown so that one run can surface
//! several independent failures. Every entry is also logged.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, warn};

use crate::types::Position;

/// Error entries stored before further ones are only counted.
pub const MAX_ERRORS: usize = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    /// A failed assertion or check.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Position,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fail => "fail",
        };
        write!(f, "{}: {label}: {}", self.position, self.message)
    }
}

#[derive(Debug, Default)]
struct DiagState {
    entries: Vec<Diagnostic>,
    /// Errors since the last drain, stored or not.
    pending_errors: usize,
    /// Errors over the whole run.
    total_errors: usize,
    dropped: usize,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    state: Mutex<DiagState>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DiagState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, severity: Severity, position: Position, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Warning => warn!(position = %position, "{message}"),
            Severity::Error | Severity::Fail => error!(position = %position, "{message}"),
        }

        let mut state = self.state();
        if severity == Severity::Warning {
            state.entries.push(Diagnostic {
                severity,
                position,
                message,
            });
            return;
        }

        state.pending_errors += 1;
        state.total_errors += 1;
        if state.pending_errors > MAX_ERRORS {
            state.dropped += 1;
            return;
        }
        state.entries.push(Diagnostic {
            severity,
            position,
            message,
        });
    }

    pub fn warning(&self, position: Position, message: impl Into<String>) {
        self.push(Severity::Warning, position, message);
    }

    pub fn error(&self, position: Position, message: impl Into<String>) {
        self.push(Severity::Error, position, message);
    }

    pub fn fail(&self, position: Position, message: impl Into<String>) {
        self.push(Severity::Fail, position, message);
    }

    /// Whether any Error/Fail entry was pushed during this run.
    pub fn has_errors(&self) -> bool {
        self.state().total_errors > 0
    }

    /// Take the stored entries, plus the number of errors that were dropped
    /// over the cap.
    pub fn drain(&self) -> (Vec<Diagnostic>, usize) {
        let mut state = self.state();
        let entries = std::mem::take(&mut state.entries);
        let dropped = std::mem::take(&mut state.dropped);
        state.pending_errors = 0;
        (entries, dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_beyond_cap_are_counted_not_stored() {
        let diags = Diagnostics::new();
        for i in 0..30 {
            diags.error(Position::default(), format!("e{i}"));
        }
        diags.warning(Position::default(), "still kept");

        let (entries, dropped) = diags.drain();
        assert_eq!(entries.len(), MAX_ERRORS + 1);
        assert_eq!(dropped, 30 - MAX_ERRORS);
        assert!(diags.has_errors());

        let (entries, dropped) = diags.drain();
        assert!(entries.is_empty());
        assert_eq!(dropped, 0);
        assert!(diags.has_errors());
    }

    #[test]
    fn warnings_do_not_fail_a_run() {
        let diags = Diagnostics::new();
        diags.warning(Position::new("Rulefile.toml", "rule out.txt"), "careful");
        assert!(!diags.has_errors());
        let (entries, _) = diags.drain();
        assert_eq!(
            entries[0].to_string(),
            "Rulefile.toml: rule out.txt: warning: careful"
        );
    }
}
