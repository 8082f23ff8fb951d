use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use rulemake::errors::Result;
use rulemake::exec::{ExecResult, ExecutorBackend, RecipeJob};

/// A fake executor that:
/// - records every recipe job it is given
/// - answers with a canned result per command (status 0 by default)
/// - optionally creates the target file in the job's directory, so that
///   up-to-date checks see the target as built.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    jobs: Arc<Mutex<Vec<RecipeJob>>>,
    results: Arc<Mutex<HashMap<String, ExecResult>>>,
    touch_targets: bool,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `<dir>/<target>` for every successful job.
    pub fn touching_targets(mut self) -> Self {
        self.touch_targets = true;
        self
    }

    /// Answer `command` with `status` and `stdout`.
    pub fn respond(&self, command: &str, status: i32, stdout: &str) {
        self.results.lock().unwrap().insert(
            command.to_string(),
            ExecResult {
                status,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    pub fn jobs(&self) -> Vec<RecipeJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.jobs().into_iter().map(|j| j.command).collect()
    }

    pub fn clear(&self) {
        self.jobs.lock().unwrap().clear();
    }
}

impl ExecutorBackend for FakeExecutor {
    fn run(&self, job: RecipeJob) -> Pin<Box<dyn Future<Output = Result<ExecResult>> + Send + '_>> {
        Box::pin(async move {
            let result = self
                .results
                .lock()
                .unwrap()
                .get(&job.command)
                .cloned()
                .unwrap_or_default();

            if self.touch_targets && result.success() {
                let path = job.dir.join(&job.target);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &job.command)?;
            }

            self.jobs.lock().unwrap().push(job);
            Ok(result)
        })
    }
}
