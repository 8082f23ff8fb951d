// src/scope/def.rs

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::DefOrigin;
use crate::value::Value;

/// A named value cell.
pub struct Def {
    name: String,
    state: Mutex<DefState>,
}

struct DefState {
    origin: DefOrigin,
    value: Value,
}

impl Def {
    pub fn new(name: impl Into<String>, origin: DefOrigin, value: Value) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(DefState { origin, value }),
        }
    }

    fn state(&self) -> MutexGuard<'_, DefState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> DefOrigin {
        self.state().origin
    }

    pub fn value(&self) -> Value {
        self.state().value.clone()
    }

    pub fn set(&self, origin: DefOrigin, value: Value) {
        let mut state = self.state();
        state.origin = origin;
        state.value = value;
    }
}

impl fmt::Debug for Def {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Def")
            .field("name", &self.name)
            .field("origin", &state.origin)
            .field("value", &state.value.strval())
            .finish()
    }
}
