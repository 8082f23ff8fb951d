// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawRulesFile, RulesFile};
use crate::errors::Result;

/// Load a rule file from a given path and return the raw `RawRulesFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (project graph, modifier names, etc.). Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRulesFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let rules: RawRulesFile = toml::from_str(&contents)?;

    Ok(rules)
}

/// Load a rule file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - unknown `bases` / `using` references,
///   - cycles between projects,
///   - rules without targets and unknown modifiers,
///   - basic global config sanity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<RulesFile> {
    let raw = load_from_path(&path)?;
    let rules = RulesFile::try_from(raw)?;
    Ok(rules)
}

/// Parse and validate rule-file text.
pub fn parse_str(text: &str) -> Result<RulesFile> {
    let raw: RawRulesFile = toml::from_str(text)?;
    RulesFile::try_from(raw)
}

/// Default rule file: `Rulefile.toml` in the current working directory.
pub fn default_rules_path() -> PathBuf {
    PathBuf::from("Rulefile.toml")
}
