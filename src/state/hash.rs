// src/state/hash.rs

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

/// Name of the hashes file inside the state directory.
pub const HASH_FILE_NAME: &str = "hashes";

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash a sequence of text fragments (e.g. recipe lines).
///
/// Fragments are separated by a NUL byte so that `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
pub fn compute_text_hash<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Abstract storage for build hashes.
///
/// Keys are `content:<target path>` and `recipe:<target path>`.
pub trait HashStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, hash: &str) -> Result<()>;
}

/// Stores hashes in `<state_dir>/hashes`, one `key hash` record per line.
pub struct FileHashStore {
    path: PathBuf,
}

impl FileHashStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(HASH_FILE_NAME),
        }
    }
}

impl HashStore for FileHashStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let map = load_all_hashes(&self.path)?;
        Ok(map.get(key).cloned())
    }

    fn save(&mut self, key: &str, hash: &str) -> Result<()> {
        let mut map = load_all_hashes(&self.path)?;
        map.insert(key.to_string(), hash.to_string());
        save_all_hashes(&self.path, &map)?;
        debug!(key = %key, hash = %hash, "stored hash (file)");
        Ok(())
    }
}

/// Stores hashes in memory only.
#[derive(Default)]
pub struct MemoryHashStore {
    map: BTreeMap<String, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(key).cloned())
    }

    fn save(&mut self, key: &str, hash: &str) -> Result<()> {
        self.map.insert(key.to_string(), hash.to_string());
        debug!(key = %key, hash = %hash, "stored hash (memory)");
        Ok(())
    }
}

fn load_all_hashes(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let file = File::open(path)
        .with_context(|| format!("opening hash file at {:?}", path))?;
    let reader = BufReader::new(file);

    let mut map = BTreeMap::new();
    for line_res in reader.lines() {
        let line = line_res?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Keys may contain spaces (paths); the hash never does.
        if let Some((key, hash)) = trimmed.rsplit_once(char::is_whitespace) {
            map.insert(key.to_string(), hash.trim().to_string());
        }
    }

    Ok(map)
}

fn save_all_hashes(path: &Path, map: &BTreeMap<String, String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("creating hash directory at {:?}", parent)
        })?;
    }

    let file = File::create(path)
        .with_context(|| format!("creating hash file at {:?}", path))?;
    let mut writer = BufWriter::new(file);

    for (key, hash) in map.iter() {
        writeln!(writer, "{} {}", key, hash)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_keys_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileHashStore::new(dir.path());
        store.save("content:/tmp/my file.txt", "abc123").unwrap();
        store.save("recipe:/tmp/out", "def456").unwrap();

        let reopened = FileHashStore::new(dir.path());
        assert_eq!(
            reopened.load("content:/tmp/my file.txt").unwrap().as_deref(),
            Some("abc123")
        );
        assert_eq!(reopened.load("missing").unwrap(), None);
    }

    #[test]
    fn text_hash_separates_fragments() {
        assert_ne!(compute_text_hash(["ab", "c"]), compute_text_hash(["a", "bc"]));
        assert_eq!(compute_text_hash(["x"]), compute_text_hash(vec!["x".to_string()]));
    }
}
