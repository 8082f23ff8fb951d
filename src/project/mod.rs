// src/project/mod.rs

//! Build modules.
//!
//! A [`Project`] owns a scope, a registry of rule entries (concrete, pattern
//! and use rules) and an ordered list of file-maps. `bases` are inherited:
//! their variables, rules and file-maps are searched after the project's
//! own. `using` projects are composed: their concrete rules are reachable
//! through qualification (`tools::gen`), their pattern rules never take part
//! in implicit resolution.

pub mod entry;
pub mod resolve;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::engine::program::Program;
use crate::errors::Result;
use crate::pattern::{FileMap, Pattern, PatternKind};
use crate::scope::{Def, Lookup, Scope};

pub use entry::{EntryClass, Outcome, RuleEntry};
pub use resolve::Realized;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Project {
    name: String,
    dir: PathBuf,
    scope: Arc<Scope>,
    bases: Vec<Arc<Project>>,
    using: Vec<Arc<Project>>,
    files: Mutex<Vec<Arc<FileMap>>>,
    concrete: Mutex<Vec<Arc<RuleEntry>>>,
    patterns: Mutex<Vec<Arc<RuleEntry>>>,
    use_rules: Mutex<Vec<Arc<RuleEntry>>>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl Project {
    /// Create a project whose scope is enclosed by `globals`.
    ///
    /// Base and using projects become reachable by name for qualified
    /// references.
    pub fn new(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        globals: &Arc<Scope>,
        bases: Vec<Arc<Project>>,
        using: Vec<Arc<Project>>,
    ) -> Arc<Self> {
        let name = name.into();
        let scope = Scope::new(name.clone(), name.clone(), Some(Arc::clone(globals)));
        for p in bases.iter().chain(using.iter()) {
            scope.insert_project(p.name(), Arc::clone(p));
        }
        Arc::new(Self {
            name,
            dir: dir.into(),
            scope,
            bases,
            using,
            files: Mutex::new(Vec::new()),
            concrete: Mutex::new(Vec::new()),
            patterns: Mutex::new(Vec::new()),
            use_rules: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn bases(&self) -> &[Arc<Project>] {
        &self.bases
    }

    pub fn using(&self) -> &[Arc<Project>] {
        &self.using
    }

    pub fn add_file_map(&self, map: FileMap) {
        lock(&self.files).push(Arc::new(map));
    }

    pub fn file_maps(&self) -> Vec<Arc<FileMap>> {
        lock(&self.files).clone()
    }

    /// The entry a rule declaration for `target` belongs to.
    ///
    /// Concrete targets and patterns are keyed by their text: declaring the
    /// same target again returns the existing entry, so its Programs
    /// accumulate on one entry.
    pub fn entry(&self, target: &str, use_rule: bool) -> Result<Arc<RuleEntry>> {
        if use_rule {
            return Ok(reuse_or_create(&self.use_rules, target, || {
                RuleEntry::new(EntryClass::Use, target, None)
            }));
        }
        match Pattern::classify(target) {
            Some(kind) => {
                let pattern = Pattern::parse(target)?;
                let class = match kind {
                    PatternKind::Percent => EntryClass::Perc,
                    PatternKind::Path => EntryClass::PathPatt,
                    PatternKind::Glob => EntryClass::Glob,
                    PatternKind::Regexp => EntryClass::Regexp,
                };
                Ok(reuse_or_create(&self.patterns, target, || {
                    RuleEntry::new(class, target, Some(pattern))
                }))
            }
            None => Ok(reuse_or_create(&self.concrete, target, || {
                RuleEntry::new(EntryClass::General, target, None)
            })),
        }
    }

    /// Attach `program` to the entry for each of `targets`.
    pub fn declare(&self, targets: &[String], use_rule: bool, phony: bool, program: Arc<Program>) -> Result<()> {
        for target in targets {
            let entry = self.entry(target, use_rule)?;
            if phony {
                entry.set_phony();
            }
            entry.add_program(Arc::clone(&program));
            debug!(project = %self.name, goal = %target, class = ?entry.class(), "declared rule");
        }
        Ok(())
    }

    pub fn concrete_entries(&self) -> Vec<Arc<RuleEntry>> {
        lock(&self.concrete).clone()
    }

    pub fn pattern_entries(&self) -> Vec<Arc<RuleEntry>> {
        lock(&self.patterns).clone()
    }

    pub fn use_entries(&self) -> Vec<Arc<RuleEntry>> {
        lock(&self.use_rules).clone()
    }

    /// Definition bound in this project or, failing that, in a base.
    fn find_local_def(&self, name: &str) -> Option<Arc<Def>> {
        if let Some(def) = self.scope.find_def_local(name) {
            return Some(def);
        }
        self.bases.iter().find_map(|b| b.find_local_def(name))
    }
}

impl Lookup for Project {
    /// Own scope, then bases depth-first, then the enclosing global scope.
    fn find_def(&self, name: &str) -> Option<Arc<Def>> {
        if name.contains("::") {
            return self.scope.find_def(name);
        }
        self.find_local_def(name)
            .or_else(|| self.scope.find_def(name))
    }
}

fn reuse_or_create(
    entries: &Mutex<Vec<Arc<RuleEntry>>>,
    name: &str,
    create: impl FnOnce() -> RuleEntry,
) -> Arc<RuleEntry> {
    let mut entries = lock(entries);
    if let Some(existing) = entries.iter().find(|e| e.name() == name) {
        return Arc::clone(existing);
    }
    let entry = Arc::new(create());
    entries.push(Arc::clone(&entry));
    entry
}
