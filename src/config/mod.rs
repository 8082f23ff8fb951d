// src/config/mod.rs

//! Rule file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a rule file from disk (`loader.rs`).
//! - Validate basic invariants like an acyclic project graph (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_rules_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    ConfigSection, FileMapSpec, MAIN_PROJECT, ProjectSection, RawRulesFile, RuleSpec, RulesFile,
    SearchPathSpec, VarSpec,
};
