// src/modifier/fileio.rs

//! `cd DIR`, `write-file [PATH]` and `append-file [PATH]`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context as _;
use tracing::info;

use crate::engine::breaker::{Breaker, Flow};
use crate::engine::traversal::Traversal;
use crate::errors::RuleError;
use crate::value::Value;

use super::Args;

/// Change the working directory of this traversal. Recipes spawned later
/// run there; nothing changes for other traversals.
pub fn cd(t: &mut Traversal, args: &Args) -> Flow<Value> {
    let Some(dir) = args.words().into_iter().next() else {
        return Err(Breaker::fail("cd needs a directory"));
    };
    let entered = t.dirs.enter(&dir).to_path_buf();
    if !entered.is_dir() {
        return Err(Breaker::fail(format!("no such directory: {}", entered.display())));
    }
    Ok(t.buffer.clone())
}

/// Write (or append) the result buffer to `PATH`, by default the target.
/// `-text=TEXT` writes `TEXT` instead.
pub fn write_file(t: &mut Traversal, args: &Args, append: bool) -> Flow<Value> {
    let target_path = t.target_file().map(|f| f.path());
    let path: PathBuf = match args.words().into_iter().next() {
        Some(p) => t.dirs.current().join(p),
        None => target_path
            .clone()
            .ok_or_else(|| Breaker::fail(format!("no file to write for '{}'", t.target_name())))?,
    };

    let mut text = match args.option("text") {
        Some(v) => v.strval(),
        None => t.buffer.strval(),
    };
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }

    if t.ctx.dry_run() {
        info!(path = ?path, bytes = text.len(), append, "would write file");
    } else {
        write(&path, &text, append).map_err(RuleError::Other)?;
    }
    if target_path.as_deref() == Some(path.as_path()) {
        t.target_updated = true;
    }
    Ok(t.buffer.clone())
}

fn write(path: &std::path::Path, text: &str, append: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating directory {:?}", parent))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .with_context(|| format!("opening {:?} for writing", path))?;
    file.write_all(text.as_bytes())?;
    Ok(())
}
