#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rulemake::config::RulesFile;
use rulemake::engine::{Context, ContextOptions};
use rulemake::exec::ExecutorBackend;
use rulemake::state::FileHashStore;
use rulemake::workspace::Workspace;

/// Context options keeping all build state inside `dir`.
pub fn options(dir: &Path) -> ContextOptions {
    ContextOptions {
        dry_run: false,
        jobs: 4,
        state_dir: dir.join(".rulemake"),
        grep_cache: Some(dir.join(".rulemake/grep-deps")),
    }
}

/// A workspace over `dir` whose state persists between calls, as separate
/// runs of the binary would see it.
pub fn workspace(dir: &Path, rules: &RulesFile, executor: Arc<dyn ExecutorBackend>) -> Workspace {
    workspace_with(dir, rules, executor, options(dir))
}

pub fn workspace_with(
    dir: &Path,
    rules: &RulesFile,
    executor: Arc<dyn ExecutorBackend>,
    options: ContextOptions,
) -> Workspace {
    let hashes = Box::new(FileHashStore::new(&options.state_dir));
    let ctx = Context::with_backends(options, executor, hashes);
    Workspace::from_rules(rules, dir, "Rulefile.toml", ctx).expect("workspace should build")
}

pub fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Set the modification time of `dir/name` to now plus `offset_secs`.
pub fn set_mtime(dir: &Path, name: &str, offset_secs: i64) {
    let now = SystemTime::now();
    let delta = Duration::from_secs(offset_secs.unsigned_abs());
    let time = if offset_secs >= 0 { now + delta } else { now - delta };
    fs::File::options()
        .write(true)
        .open(dir.join(name))
        .unwrap()
        .set_modified(time)
        .unwrap();
}

pub fn goals(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
