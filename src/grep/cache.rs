// src/grep/cache.rs

//! Grepped dependencies of every target, kept across runs.
//!
//! File format: a `:<target path>` header line followed by one
//! `name|sub|dir` record per discovered dependency.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// A dependency as `dir/sub/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub name: String,
    pub sub: String,
    pub dir: PathBuf,
}

#[derive(Debug, Default)]
struct CacheState {
    map: BTreeMap<PathBuf, Vec<CacheEntry>>,
    changed: bool,
}

#[derive(Debug)]
pub struct GrepCache {
    path: PathBuf,
    state: Mutex<CacheState>,
}

/// Default cache file: `<temp>/rulemake/grep-deps`.
pub fn default_cache_path() -> PathBuf {
    std::env::temp_dir().join("rulemake").join("grep-deps")
}

impl GrepCache {
    /// Load the cache from `path`; a missing or unreadable file gives an empty
    /// cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = match fs::read_to_string(&path) {
            Ok(text) => parse(&text),
            Err(err) => {
                if path.exists() {
                    warn!(path = ?path, error = %err, "ignoring unreadable grep cache");
                }
                BTreeMap::new()
            }
        };
        debug!(path = ?path, targets = map.len(), "loaded grep cache");
        Self {
            path,
            state: Mutex::new(CacheState { map, changed: false }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, target: &Path) -> Option<Vec<CacheEntry>> {
        self.state().map.get(target).cloned()
    }

    pub fn insert(&self, target: PathBuf, entries: Vec<CacheEntry>) {
        let mut state = self.state();
        if state.map.get(&target) != Some(&entries) {
            state.map.insert(target, entries);
            state.changed = true;
        }
    }

    /// Write the cache back if anything changed.
    pub fn save(&self) -> Result<()> {
        let mut state = self.state();
        if !state.changed {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating grep cache directory {:?}", parent))?;
        }
        let file = File::create(&self.path)
            .with_context(|| format!("creating grep cache {:?}", self.path))?;
        let mut writer = BufWriter::new(file);
        for (target, entries) in state.map.iter() {
            writeln!(writer, ":{}", target.display())?;
            for e in entries {
                writeln!(writer, "{}|{}|{}", e.name, e.sub, e.dir.display())?;
            }
        }
        writer.flush()?;
        state.changed = false;
        debug!(path = ?self.path, targets = state.map.len(), "saved grep cache");
        Ok(())
    }
}

fn parse(text: &str) -> BTreeMap<PathBuf, Vec<CacheEntry>> {
    let mut map: BTreeMap<PathBuf, Vec<CacheEntry>> = BTreeMap::new();
    let mut current: Option<PathBuf> = None;
    for line in text.lines() {
        if let Some(target) = line.strip_prefix(':') {
            let target = PathBuf::from(target);
            map.entry(target.clone()).or_default();
            current = Some(target);
            continue;
        }
        let Some(target) = &current else {
            continue;
        };
        let mut fields = line.splitn(3, '|');
        if let (Some(name), Some(sub), Some(dir)) = (fields.next(), fields.next(), fields.next()) {
            map.entry(target.clone()).or_default().push(CacheEntry {
                name: name.to_string(),
                sub: sub.to_string(),
                dir: PathBuf::from(dir),
            });
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/grep-deps");
        let cache = GrepCache::load(&path);
        assert!(cache.get(Path::new("/p/main.o")).is_none());

        let entries = vec![
            CacheEntry { name: "util.h".into(), sub: "".into(), dir: "/p/inc".into() },
            CacheEntry { name: "types.h".into(), sub: "sys".into(), dir: "/p/inc".into() },
        ];
        cache.insert(PathBuf::from("/p/main.o"), entries.clone());
        cache.save().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, ":/p/main.o\nutil.h||/p/inc\ntypes.h|sys|/p/inc\n");

        let reloaded = GrepCache::load(&path);
        assert_eq!(reloaded.get(Path::new("/p/main.o")), Some(entries));
    }

    #[test]
    fn records_before_any_header_are_ignored() {
        let map = parse("orphan||/x\n:/t\na||/d\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map[Path::new("/t")].len(), 1);
    }
}
