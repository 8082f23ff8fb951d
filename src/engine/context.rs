// src/engine/context.rs

//! Process-wide state shared by every traversal of a run.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::warn;

use crate::engine::diagnostics::Diagnostics;
use crate::errors::{Result, RuleError};
use crate::exec::{ExecutorBackend, RealExecutorBackend};
use crate::grep::{GrepCache, default_cache_path};
use crate::scope::Scope;
use crate::state::{FileHashStore, HashStore};

/// Default state directory, relative to the rule file.
pub const DEFAULT_STATE_DIR: &str = ".rulemake";

#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Log recipes instead of running them.
    pub dry_run: bool,
    /// Maximum number of concurrently running recipe processes.
    pub jobs: usize,
    pub state_dir: PathBuf,
    /// Grep cache file; `None` uses [`default_cache_path`].
    pub grep_cache: Option<PathBuf>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 1,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            grep_cache: None,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Context {
    options: ContextOptions,
    globals: Arc<Scope>,
    diagnostics: Diagnostics,
    grep_cache: GrepCache,
    hashes: Mutex<Box<dyn HashStore>>,
    executor: Arc<dyn ExecutorBackend>,
    jobs: Semaphore,
    updated: Mutex<HashSet<PathBuf>>,
    once: Mutex<HashSet<String>>,
    visits: Mutex<HashMap<String, usize>>,
    file_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    /// Wait-for edges: a branch holding the key waits on each listed path.
    waits: Mutex<HashMap<PathBuf, Vec<PathBuf>>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context with the real executor and hashes stored under the state
    /// directory.
    pub fn new(options: ContextOptions) -> Arc<Self> {
        let hashes = Box::new(FileHashStore::new(&options.state_dir));
        Self::with_backends(options, Arc::new(RealExecutorBackend), hashes)
    }

    pub fn with_backends(
        options: ContextOptions,
        executor: Arc<dyn ExecutorBackend>,
        hashes: Box<dyn HashStore>,
    ) -> Arc<Self> {
        let cache_path = options.grep_cache.clone().unwrap_or_else(default_cache_path);
        Arc::new(Self {
            jobs: Semaphore::new(options.jobs.max(1)),
            globals: Scope::new("global", "", None),
            diagnostics: Diagnostics::new(),
            grep_cache: GrepCache::load(cache_path),
            hashes: Mutex::new(hashes),
            executor,
            updated: Mutex::new(HashSet::new()),
            once: Mutex::new(HashSet::new()),
            visits: Mutex::new(HashMap::new()),
            file_locks: Mutex::new(HashMap::new()),
            waits: Mutex::new(HashMap::new()),
            options,
        })
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn dry_run(&self) -> bool {
        self.options.dry_run
    }

    pub fn state_dir(&self) -> &Path {
        &self.options.state_dir
    }

    /// Scope enclosing every project scope.
    pub fn globals(&self) -> &Arc<Scope> {
        &self.globals
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn grep_cache(&self) -> &GrepCache {
        &self.grep_cache
    }

    pub fn executor(&self) -> &Arc<dyn ExecutorBackend> {
        &self.executor
    }

    /// Wait for a free recipe slot.
    pub async fn acquire_job(&self) -> Result<SemaphorePermit<'_>> {
        self.jobs
            .acquire()
            .await
            .map_err(|e| RuleError::Other(e.into()))
    }

    pub fn is_updated(&self, path: &Path) -> bool {
        lock(&self.updated).contains(path)
    }

    pub fn mark_updated(&self, path: PathBuf) {
        lock(&self.updated).insert(path);
    }

    /// Record `key`; `false` if it was already recorded in this run.
    pub fn first_once(&self, key: &str) -> bool {
        lock(&self.once).insert(key.to_string())
    }

    /// Count a visit of `key` and return the new count.
    pub fn visit(&self, key: &str) -> usize {
        let mut visits = lock(&self.visits);
        let count = visits.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Async lock serializing concurrent traversals of the same file.
    pub fn file_lock(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = lock(&self.file_locks);
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }

    /// Record that a branch holding the locks of `held` is about to wait on
    /// the lock of `wanted`.
    ///
    /// When whoever holds `wanted` already waits, directly or through other
    /// branches, on one of `held`, the wait would never end: nothing is
    /// recorded and the held path closing the cycle is returned.
    pub fn begin_wait(&self, held: &[PathBuf], wanted: &Path) -> Option<PathBuf> {
        let mut waits = lock(&self.waits);
        if let Some(closing) = reaches(&waits, wanted, held) {
            return Some(closing);
        }
        for path in held {
            waits.entry(path.clone()).or_default().push(wanted.to_path_buf());
        }
        None
    }

    /// Drop the edges recorded by [`Context::begin_wait`].
    pub fn end_wait(&self, held: &[PathBuf], wanted: &Path) {
        let mut waits = lock(&self.waits);
        for path in held {
            if let Some(targets) = waits.get_mut(path) {
                if let Some(i) = targets.iter().position(|t| t == wanted) {
                    targets.swap_remove(i);
                }
                if targets.is_empty() {
                    waits.remove(path);
                }
            }
        }
    }

    pub fn load_hash(&self, key: &str) -> Option<String> {
        match lock(&self.hashes).load(key) {
            Ok(hash) => hash,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to read stored hash");
                None
            }
        }
    }

    pub fn save_hash(&self, key: &str, hash: &str) {
        if let Err(err) = lock(&self.hashes).save(key, hash) {
            warn!(key = %key, error = %err, "failed to store hash");
        }
    }

    /// Persist run state that is written lazily.
    pub fn finish(&self) -> anyhow::Result<()> {
        self.grep_cache.save()
    }
}

/// First path of `held` reachable from `start` over wait-for edges.
fn reaches(waits: &HashMap<PathBuf, Vec<PathBuf>>, start: &Path, held: &[PathBuf]) -> Option<PathBuf> {
    let mut seen = HashSet::new();
    let mut stack = vec![start.to_path_buf()];
    while let Some(path) = stack.pop() {
        if !seen.insert(path.clone()) {
            continue;
        }
        if let Some(targets) = waits.get(&path) {
            for next in targets {
                if held.contains(next) {
                    return Some(next.clone());
                }
                stack.push(next.clone());
            }
        }
    }
    None
}
