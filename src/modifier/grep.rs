// src/modifier/grep.rs

//! `grep-files REGEX... [-recursive]`: implicit dependencies.
//!
//! The target is scanned for the regexes; every captured name is resolved
//! through the project's file-maps. Scan results are kept in a side file
//! under the state directory and reused verbatim while the side file is
//! newer than the target. Non-system files found are recorded in the grep
//! cache, where later runs pick them up as grepped prerequisites.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};

use crate::engine::breaker::Flow;
use crate::engine::traversal::Traversal;
use crate::errors::RuleError;
use crate::grep::{CacheEntry, GrepRecord, read_side_file, scan_file, side_file_path, write_side_file};
use crate::project::Project;
use crate::value::{File, Value};

use super::Args;

pub fn grep_files(t: &mut Traversal, args: &Args) -> Flow<Value> {
    let Some(target) = t.target_file().cloned() else {
        return Ok(t.buffer.clone());
    };
    let regexes = args
        .items
        .iter()
        .map(|v| Regex::new(&v.strval()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(RuleError::from)?;
    let recursive = args.flag("recursive");

    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([target.path()]);
    let mut found: Vec<File> = Vec::new();
    let mut entries: Vec<CacheEntry> = Vec::new();

    while let Some(path) = queue.pop_front() {
        for record in records_for(&t.project, t.ctx.state_dir(), &path, &regexes)? {
            let file = t.project.resolve_file(&record.name);
            if !seen.insert(file.path()) {
                continue;
            }
            if !record.system && !file.system {
                entries.push(CacheEntry {
                    name: file.name.clone(),
                    sub: file.sub.clone(),
                    dir: file.dir.clone(),
                });
                if recursive && file.exists() {
                    queue.push_back(file.path());
                }
            }
            found.push(file);
        }
    }

    debug!(goal = %t.target_name(), found = found.len(), tracked = entries.len(), "grepped dependencies");
    t.ctx.grep_cache().insert(target.path(), entries);
    Ok(Value::List(found.into_iter().map(Value::File).collect()))
}

/// Records for `path`, from its side file when that is up to date.
fn records_for(project: &Project, state_dir: &Path, path: &Path, regexes: &[Regex]) -> Flow<Vec<GrepRecord>> {
    let Ok(meta) = fs::metadata(path) else {
        debug!(path = ?path, "nothing to scan");
        return Ok(Vec::new());
    };
    let side = side_file_path(state_dir, path);
    let fresh = match (fs::metadata(&side).and_then(|m| m.modified()), meta.modified()) {
        (Ok(side_time), Ok(file_time)) => side_time >= file_time,
        _ => false,
    };
    if fresh {
        match read_side_file(&side) {
            Ok(records) => return Ok(records),
            Err(err) => warn!(path = ?side, error = %err, "rescanning after unreadable side file"),
        }
    }

    let mut records = scan_file(path, regexes).map_err(RuleError::Other)?;
    for record in &mut records {
        record.system = project.match_file(&record.name).is_some_and(|f| f.system);
    }
    if let Err(err) = write_side_file(&side, &records) {
        warn!(path = ?side, error = %err, "failed to write side file");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{FileMap, SearchPath};
    use crate::scope::Scope;

    #[test]
    fn side_file_is_reused_while_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join(".state");
        let src = dir.path().join("main.c");
        fs::write(&src, "#include \"a.h\"\n").unwrap();

        let project = Project::new("main", dir.path(), &Scope::new("global", "", None), vec![], vec![]);
        project.add_file_map(FileMap::from_text("%.h", vec![SearchPath::new("/usr/include", true)]).unwrap());
        let re = Regex::new(r#"#include\s*"([^"]+)""#).unwrap();

        let first = records_for(&project, &state, &src, std::slice::from_ref(&re)).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].system);

        // Edit the side file: a fresh side file is trusted verbatim.
        let side = side_file_path(&state, &src);
        fs::write(&side, "0 1 11 b.h\n").unwrap();
        let again = records_for(&project, &state, &src, &[re]).unwrap();
        assert_eq!(again[0].name, "b.h");
        assert!(!again[0].system);
    }
}
