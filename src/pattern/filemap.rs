// src/pattern/filemap.rs

//! File-maps: name pattern → list of search directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Pattern;
use crate::value::File;

/// What a file-map applies to.
#[derive(Debug, Clone)]
pub enum MapPattern {
    Pattern(Pattern),
    /// An exact logical name.
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    pub path: PathBuf,
    /// Files found here are recorded but never tracked.
    pub system: bool,
}

impl SearchPath {
    pub fn new(path: impl Into<PathBuf>, system: bool) -> Self {
        Self {
            path: path.into(),
            system,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMatch {
    /// Logical prefix captured in front of the matched part.
    pub pre: String,
    pub rest: String,
    pub stems: Vec<String>,
}

#[derive(Debug)]
pub struct FileMap {
    pattern: MapPattern,
    paths: Vec<SearchPath>,
}

impl FileMap {
    pub fn new(pattern: MapPattern, paths: Vec<SearchPath>) -> Self {
        Self { pattern, paths }
    }

    /// Build from text: pattern syntax gives a pattern map, anything else a
    /// literal one.
    pub fn from_text(text: &str, paths: Vec<SearchPath>) -> crate::errors::Result<Self> {
        let pattern = match Pattern::classify(text) {
            Some(_) => MapPattern::Pattern(Pattern::parse(text)?),
            None => MapPattern::Literal(text.to_string()),
        };
        Ok(Self::new(pattern, paths))
    }

    pub fn pattern(&self) -> &MapPattern {
        &self.pattern
    }

    pub fn paths(&self) -> &[SearchPath] {
        &self.paths
    }

    pub fn matches(&self, name: &str) -> Option<FileMatch> {
        match &self.pattern {
            MapPattern::Pattern(p) => p.matches(name).map(|m| FileMatch {
                pre: m.prefix,
                rest: m.matched,
                stems: m.stems,
            }),
            MapPattern::Literal(lit) => {
                if name == lit {
                    return Some(FileMatch {
                        pre: String::new(),
                        rest: name.to_string(),
                        stems: Vec::new(),
                    });
                }
                if lit.contains('/') {
                    return None;
                }
                let (pre, last) = name.rsplit_once('/')?;
                (last == lit).then(|| FileMatch {
                    pre: pre.to_string(),
                    rest: last.to_string(),
                    stems: Vec::new(),
                })
            }
        }
    }

    /// Resolve a match against the search paths.
    ///
    /// Relative search paths are taken relative to `base`. Returns the first
    /// existing file, or a placeholder under the first search path when none
    /// exists. `None` only when the map has no search paths.
    pub fn stat(self: &Arc<Self>, base: &Path, found: &FileMatch) -> Option<File> {
        let mut first = None;
        for search in &self.paths {
            let dir = if search.path.is_absolute() {
                search.path.clone()
            } else {
                base.join(&search.path)
            };
            let file = File::locate(dir, &found.pre, &found.rest).with_map(Arc::clone(self), search.system);
            if file.exists() {
                return Some(file);
            }
            if first.is_none() {
                first = Some(file);
            }
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn literal_map_matches_last_component() {
        let map = FileMap::from_text("config.h", vec![]).unwrap();
        let m = map.matches("gen/config.h").unwrap();
        assert_eq!(m.pre, "gen");
        assert_eq!(m.rest, "config.h");
        assert!(map.matches("config.hpp").is_none());
    }

    #[test]
    fn stat_prefers_first_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/x.h"), "").unwrap();

        let map = Arc::new(
            FileMap::from_text(
                "%.h",
                vec![
                    SearchPath::new("a", false),
                    SearchPath::new("b", true),
                ],
            )
            .unwrap(),
        );
        let found = map.matches("x.h").unwrap();
        let file = map.stat(dir.path(), &found).unwrap();
        assert!(file.exists());
        assert!(file.system);
        assert_eq!(file.path(), dir.path().join("b/x.h"));

        let missing = map.matches("y.h").unwrap();
        let placeholder = map.stat(dir.path(), &missing).unwrap();
        assert!(!placeholder.exists());
        assert_eq!(placeholder.path(), dir.path().join("a/y.h"));
    }
}
