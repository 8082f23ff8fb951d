use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// When the value of a definition is expanded.
///
/// - `Default`: references stay delegated and are expanded on use.
/// - `Simple` / `Expand`: references are expanded at assignment time.
/// - `Execute`: the value is run as a shell command; trimmed stdout is stored.
/// - The remaining origins are assigned by the engine, not by rule files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefOrigin {
    Default,
    Simple,
    Expand,
    Execute,
    Auto,
    Arg,
    Decl,
    ConfigRef,
    Config,
}

impl Default for DefOrigin {
    fn default() -> Self {
        DefOrigin::Default
    }
}

impl FromStr for DefOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "=" => Ok(DefOrigin::Default),
            "simple" | ":=" => Ok(DefOrigin::Simple),
            "expand" | "::=" => Ok(DefOrigin::Expand),
            "execute" | "!=" => Ok(DefOrigin::Execute),
            other => Err(format!(
                "invalid origin: {other} (expected \"default\", \"simple\", \"expand\" or \"execute\")"
            )),
        }
    }
}

/// Interpreter used for a rule's recipes when its pipeline names none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Each recipe is a shell command line.
    Shell,
    /// Recipes are expanded into the result buffer, nothing is executed.
    Plain,
}

impl Default for Language {
    fn default() -> Self {
        Language::Shell
    }
}

impl Language {
    pub fn modifier_name(self) -> &'static str {
        match self {
            Language::Shell => "shell",
            Language::Plain => "plain",
        }
    }
}

/// Location of a declaration, used in diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub file: String,
    pub item: String,
}

impl Position {
    pub fn new(file: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            item: item.into(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.file.is_empty(), self.item.is_empty()) {
            (true, true) => write!(f, "<unknown>"),
            (false, true) => write!(f, "{}", self.file),
            (true, false) => write!(f, "{}", self.item),
            (false, false) => write!(f, "{}: {}", self.file, self.item),
        }
    }
}
