// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cyclic binding: '{name}' references itself")]
    CyclicBinding { name: String },

    #[error("undefined name '{name}'")]
    Undefined { name: String },

    #[error("no rule to update target '{target}'")]
    NoRule { target: String },

    #[error("max recursion reached for '{target}' ({depth} nested invocations)")]
    MaxRecursion { target: String, depth: usize },

    #[error("dependency cycle: '{target}' is being built by a branch that waits on '{held}'")]
    DependencyCycle { target: String, held: String },

    #[error("bad pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    #[error("Cycle detected in project graph: {0}")]
    ProjectCycle(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RuleError>;
