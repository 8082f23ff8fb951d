// src/state/mod.rs

//! Build state persisted between runs.

pub mod hash;

pub use hash::{FileHashStore, HashStore, MemoryHashStore, compute_file_hash, compute_text_hash};
