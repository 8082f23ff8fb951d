// src/scope/mod.rs

//! Hierarchical symbol tables.
//!
//! A [`Scope`] maps names to [`Object`]s (definitions and project names) and
//! falls through to its `outer` scope on lookup. Outer links only ever point
//! to already constructed, strictly enclosing scopes, so the scope graph is
//! acyclic by construction.

pub mod def;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::{Result, RuleError};
use crate::exec::command::run_capture_sync;
use crate::project::Project;
use crate::types::DefOrigin;
use crate::value::Value;

pub use def::Def;

/// Something that can resolve a definition by name.
pub trait Lookup {
    fn find_def(&self, name: &str) -> Option<Arc<Def>>;
}

/// A named, scoped entity.
#[derive(Clone)]
pub enum Object {
    Def(Arc<Def>),
    /// A project reachable by qualification (`name::item`).
    Project(Arc<Project>),
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Def(def) => f.debug_tuple("Def").field(&def.name()).finish(),
            Object::Project(p) => f.debug_tuple("Project").field(&p.name()).finish(),
        }
    }
}

pub struct Scope {
    name: String,
    owner: String,
    elements: Mutex<HashMap<String, Object>>,
    outer: Option<Arc<Scope>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Scope {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, outer: Option<Arc<Scope>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            owner: owner.into(),
            elements: Mutex::new(HashMap::new()),
            outer,
        })
    }

    /// A transient sub-scope owned by the same project.
    pub fn child(self: &Arc<Self>, name: impl Into<String>) -> Arc<Scope> {
        Scope::new(name, self.owner.clone(), Some(Arc::clone(self)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the project owning this scope.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn outer(&self) -> Option<&Arc<Scope>> {
        self.outer.as_ref()
    }

    fn elements(&self) -> MutexGuard<'_, HashMap<String, Object>> {
        self.elements.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Object bound in this scope only.
    pub fn lookup(&self, name: &str) -> Option<Object> {
        self.elements().get(name).cloned()
    }

    /// Object bound in this scope or any outer scope, with the scope that
    /// defines it.
    pub fn find(self: &Arc<Self>, name: &str) -> Option<(Arc<Scope>, Object)> {
        let mut current = Some(Arc::clone(self));
        while let Some(scope) = current {
            if let Some(obj) = scope.lookup(name) {
                return Some((scope, obj));
            }
            current = scope.outer.clone();
        }
        None
    }

    /// Define `name` unless it already exists in this scope.
    ///
    /// Returns the bound definition and whether it was newly created. If
    /// the name is bound to something else than a definition, that is an
    /// error.
    pub fn define(&self, name: &str, origin: DefOrigin, value: Value) -> Result<(Arc<Def>, bool)> {
        let mut elements = self.elements();
        match elements.get(name) {
            Some(Object::Def(def)) => Ok((Arc::clone(def), false)),
            Some(Object::Project(_)) => Err(RuleError::Config(format!(
                "'{name}' is already bound to a project in scope '{}'",
                self.name
            ))),
            None => {
                let def = Arc::new(Def::new(name, origin, value));
                elements.insert(name.to_string(), Object::Def(Arc::clone(&def)));
                Ok((def, true))
            }
        }
    }

    /// Define or overwrite `name` in this scope without any expansion.
    pub fn replace(&self, name: &str, origin: DefOrigin, value: Value) -> Result<Arc<Def>> {
        let (def, created) = self.define(name, origin, value.clone())?;
        if !created {
            def.set(origin, value);
        }
        Ok(def)
    }

    /// Assign `value` to `name` in this scope, honouring the origin's
    /// expansion rules.
    ///
    /// The value may not (transitively) reference the definition itself,
    /// except under `Simple` origin where references are expanded against the
    /// previous value first.
    pub fn assign(self: &Arc<Self>, name: &str, origin: DefOrigin, value: Value) -> Result<Arc<Def>> {
        let resolved = match origin {
            DefOrigin::Simple => {
                let previous = self.find_def(name);
                let lookup = ShadowLookup {
                    scope: self.as_ref(),
                    name,
                    previous,
                };
                value.expand(&lookup)?
            }
            DefOrigin::Expand => {
                self.ensure_acyclic(name, &value)?;
                value.expand(self.as_ref())?
            }
            DefOrigin::Execute => {
                self.ensure_acyclic(name, &value)?;
                let command = value.expand(self.as_ref())?.strval();
                let output = run_capture_sync(&command, None)?;
                Value::Str(output.trim().to_string())
            }
            DefOrigin::Default => {
                self.ensure_acyclic(name, &value)?;
                value
            }
            DefOrigin::Auto | DefOrigin::Arg | DefOrigin::Decl | DefOrigin::ConfigRef | DefOrigin::Config => value,
        };
        self.replace(name, origin, resolved)
    }

    fn ensure_acyclic(&self, name: &str, value: &Value) -> Result<()> {
        if value.references(name, self) {
            return Err(RuleError::CyclicBinding {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Bind a project name so `name::item` reaches into it.
    pub fn insert_project(&self, name: &str, project: Arc<Project>) {
        self.elements()
            .insert(name.to_string(), Object::Project(project));
    }

    /// Names bound directly in this scope, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.elements().keys().cloned().collect();
        names.sort();
        names
    }

    /// Definition bound in this scope only.
    pub fn find_def_local(&self, name: &str) -> Option<Arc<Def>> {
        match self.lookup(name) {
            Some(Object::Def(def)) => Some(def),
            _ => None,
        }
    }

    fn find_def_chain(&self, name: &str) -> Option<Arc<Def>> {
        if let Some(def) = self.find_def_local(name) {
            return Some(def);
        }
        self.outer.as_ref().and_then(|outer| outer.find_def_chain(name))
    }

    fn find_project(&self, name: &str) -> Option<Arc<Project>> {
        if let Some(Object::Project(p)) = self.lookup(name) {
            return Some(p);
        }
        self.outer.as_ref().and_then(|outer| outer.find_project(name))
    }
}

impl Lookup for Scope {
    /// `find` narrowed to definitions; `project::name` is resolved through
    /// the bound project.
    fn find_def(&self, name: &str) -> Option<Arc<Def>> {
        if let Some((project, item)) = name.split_once("::") {
            return self
                .find_project(project)
                .and_then(|p| p.find_def(item));
        }
        self.find_def_chain(name)
    }
}

/// Lookup used for `Simple` assignments: the name being assigned resolves
/// to its previous definition (or to nothing).
struct ShadowLookup<'a> {
    scope: &'a Scope,
    name: &'a str,
    previous: Option<Arc<Def>>,
}

impl Lookup for ShadowLookup<'_> {
    fn find_def(&self, name: &str) -> Option<Arc<Def>> {
        if name == self.name {
            return self
                .previous
                .clone()
                .or_else(|| Some(Arc::new(Def::new(name, DefOrigin::Simple, Value::None))));
        }
        self.scope.find_def(name)
    }
}
