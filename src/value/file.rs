// src/value/file.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::pattern::FileMap;

/// Result of a `stat` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub modified: Option<SystemTime>,
    pub len: u64,
    pub is_dir: bool,
}

impl FileInfo {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        Self {
            modified: meta.modified().ok(),
            len: meta.len(),
            is_dir: meta.is_dir(),
        }
    }
}

/// A logical name resolved to a location on disk.
///
/// The on-disk path is `dir/sub/name`, where `dir` is the search directory the
/// name was resolved in and `sub` is the logical prefix captured from the
/// name. `info == None` means the file is missing (or has not been stat'd).
#[derive(Debug, Clone)]
pub struct File {
    pub name: String,
    pub sub: String,
    pub dir: PathBuf,
    pub info: Option<FileInfo>,
    pub map: Option<Arc<FileMap>>,
    /// Resolved through a search path flagged as system (never tracked).
    pub system: bool,
}

impl File {
    /// Resolve `pre/rest` under `dir` and stat it.
    pub fn locate(dir: impl Into<PathBuf>, pre: &str, rest: &str) -> Self {
        let logical = match (pre.is_empty(), rest.is_empty()) {
            (true, _) => rest.to_string(),
            (false, true) => pre.to_string(),
            (false, false) => format!("{pre}/{rest}"),
        };
        let (sub, name) = match logical.rsplit_once('/') {
            Some((sub, name)) => (sub.to_string(), name.to_string()),
            None => (String::new(), logical),
        };
        let mut file = Self {
            name,
            sub,
            dir: dir.into(),
            info: None,
            map: None,
            system: false,
        };
        file.stat();
        file
    }

    /// A file addressed by an absolute (or already resolved) path.
    pub fn at_path(path: &Path) -> Self {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::locate(dir, "", &name)
    }

    pub fn with_map(mut self, map: Arc<FileMap>, system: bool) -> Self {
        self.map = Some(map);
        self.system = system;
        self
    }

    /// The logical name (`sub/name`).
    pub fn logical(&self) -> String {
        if self.sub.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.sub, self.name)
        }
    }

    pub fn path(&self) -> PathBuf {
        let mut path = self.dir.clone();
        if !self.sub.is_empty() {
            path.push(&self.sub);
        }
        path.push(&self.name);
        path
    }

    /// Refresh `info` from the filesystem.
    pub fn stat(&mut self) -> &mut Self {
        self.info = fs::metadata(self.path())
            .ok()
            .map(|meta| FileInfo::from_metadata(&meta));
        self
    }

    pub fn exists(&self) -> bool {
        self.info.is_some()
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.info.as_ref().and_then(|i| i.modified)
    }

    /// Whether `self` was modified after `other`; a missing `other` counts as
    /// older.
    pub fn newer_than(&self, other: &File) -> bool {
        match (self.modified(), other.modified()) {
            (Some(a), Some(b)) => a > b,
            (Some(_), None) => true,
            _ => false,
        }
    }
}
