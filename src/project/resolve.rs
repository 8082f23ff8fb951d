// src/project/resolve.rs

//! Name resolution: goals to rule entries, logical names to files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobSetBuilder};
use tracing::trace;

use super::{Project, RuleEntry};
use crate::errors::Result;
use crate::scope::Object;
use crate::value::{File, Value};

/// A rule entry bound to a concrete target.
#[derive(Debug, Clone)]
pub struct Realized {
    pub entry: Arc<RuleEntry>,
    pub target: Value,
    /// Captured stems; empty for concrete entries.
    pub stems: Vec<String>,
}

impl Project {
    /// Concrete entry for `name`: own entries first, then bases depth-first
    /// in declaration order.
    pub fn resolve_entry(&self, name: &str) -> Option<Arc<RuleEntry>> {
        if let Some(entry) = self.concrete_entries().into_iter().find(|e| e.name() == name) {
            return Some(entry);
        }
        self.bases().iter().find_map(|b| b.resolve_entry(name))
    }

    /// Pattern entries matching `candidate`, own before bases, each in
    /// declaration order. `using` projects are not searched.
    ///
    /// For a single-component pattern matched below a directory, the
    /// directory is folded into the first stem (`obj/foo.o` against `%.o`
    /// gives the stem `obj/foo`). A pattern without stems, such as `?.o`,
    /// binds the target with no stems.
    pub fn resolve_patterns(&self, candidate: &str) -> Vec<(Arc<RuleEntry>, Vec<String>)> {
        let mut found = Vec::new();
        for entry in self.pattern_entries() {
            let Some(pattern) = entry.pattern() else {
                continue;
            };
            if let Some(m) = pattern.matches(candidate) {
                let mut stems = m.stems;
                if !m.prefix.is_empty() {
                    if let Some(first) = stems.first_mut() {
                        *first = format!("{}/{}", m.prefix, first);
                    }
                }
                trace!(candidate = %candidate, pattern = %pattern, ?stems, "pattern matched");
                found.push((entry, stems));
            }
        }
        for base in self.bases() {
            found.extend(base.resolve_patterns(candidate));
        }
        found
    }

    /// Use-rule named `name`, own before bases.
    pub fn resolve_use(&self, name: &str) -> Option<Arc<RuleEntry>> {
        if let Some(entry) = self.use_entries().into_iter().find(|e| e.name() == name) {
            return Some(entry);
        }
        self.bases().iter().find_map(|b| b.resolve_use(name))
    }

    /// Rule that builds `name`, bound to its target.
    ///
    /// `proj::target` is resolved by the named base or using project.
    /// Otherwise concrete entries win over patterns, and the first matching
    /// pattern wins.
    pub fn resolve_goal(&self, name: &str) -> Option<Realized> {
        if let Some((project, item)) = name.split_once("::") {
            let Some((_, Object::Project(p))) = self.scope().find(project) else {
                return None;
            };
            return p.resolve_goal(item);
        }

        if let Some(entry) = self.resolve_entry(name) {
            let target = self.target_value(&entry, name);
            return Some(Realized {
                entry,
                target,
                stems: Vec::new(),
            });
        }

        let (entry, stems) = self.resolve_patterns(name).into_iter().next()?;
        let target = self.target_value(&entry, name);
        Some(Realized {
            entry,
            target,
            stems,
        })
    }

    fn target_value(&self, entry: &RuleEntry, name: &str) -> Value {
        if entry.is_phony() {
            Value::str(name)
        } else {
            Value::File(self.resolve_file(name))
        }
    }

    /// Resolve `name` through the file-maps.
    ///
    /// Own maps are searched first and short-circuit the search as soon as
    /// one of them matches; then bases, then `using` projects. Among the
    /// matches searched, the first existing file wins, otherwise the first
    /// attempted one is returned as a placeholder.
    pub fn match_file(&self, name: &str) -> Option<File> {
        self.match_file_in(name, true)
    }

    fn match_file_in(&self, name: &str, with_using: bool) -> Option<File> {
        let mut first: Option<File> = None;

        for map in self.file_maps() {
            let Some(found) = map.matches(name) else {
                continue;
            };
            if let Some(file) = map.stat(self.dir(), &found) {
                if file.exists() {
                    return Some(file);
                }
                first.get_or_insert(file);
            }
        }
        if first.is_some() {
            return first;
        }

        let mut others: Vec<&Arc<Project>> = self.bases().iter().collect();
        if with_using {
            others.extend(self.using());
        }
        for other in others {
            if let Some(file) = other.match_file_in(name, false) {
                if file.exists() {
                    return Some(file);
                }
                first.get_or_insert(file);
            }
        }
        first
    }

    /// File for `name`: through the file-maps, or relative to the project
    /// directory.
    pub fn resolve_file(&self, name: &str) -> File {
        let path = Path::new(name);
        if path.is_absolute() {
            return File::at_path(path);
        }
        self.match_file(name)
            .unwrap_or_else(|| File::locate(self.dir(), "", name))
    }

    /// Files under the project directory matching any of `patterns`, sorted
    /// by relative path. Hidden directories are not searched.
    pub fn wildcard(&self, patterns: &[String]) -> Result<Vec<File>> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = GlobBuilder::new(pat).literal_separator(true).build()?;
            builder.add(glob);
        }
        let set = builder.build()?;

        let root = self.dir();
        let mut matched: Vec<PathBuf> = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                if path.is_dir() {
                    if !hidden {
                        stack.push(path);
                    }
                    continue;
                }
                if let Ok(rel) = path.strip_prefix(root) {
                    if set.is_match(rel) {
                        matched.push(rel.to_path_buf());
                    }
                }
            }
        }
        matched.sort();

        Ok(matched
            .iter()
            .map(|rel| File::locate(root, "", &rel.to_string_lossy().replace('\\', "/")))
            .collect())
    }
}
