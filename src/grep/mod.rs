// src/grep/mod.rs

//! Implicit dependency discovery.
//!
//! A built file is scanned line by line against a set of regular
//! expressions; every match names another file the target depends on. The
//! scan results are kept in a per-target side file so that an unchanged
//! target is never scanned twice, and the resolved dependencies go to the
//! [`GrepCache`] so the next run can traverse them before the target.

pub mod cache;
pub mod scan;

pub use cache::{CacheEntry, GrepCache, default_cache_path};
pub use scan::{GrepRecord, read_side_file, scan_file, side_file_path, write_side_file};
