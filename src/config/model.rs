// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{DefOrigin, Language};

/// Name of the top-level project.
pub const MAIN_PROJECT: &str = "main";

/// Rule file as read from TOML.
///
/// ```toml
/// bases = ["common"]
///
/// [config]
/// jobs = 4
///
/// [vars]
/// CC = "cc"
/// CFLAGS = { value = "-O2 $(EXTRA)", origin = "simple" }
///
/// [[files]]
/// pattern = "%.h"
/// paths = ["include", { path = "/usr/include", system = true }]
///
/// [[rule]]
/// targets = ["%.o"]
/// depends = ["%.c"]
/// recipes = ["$(CC) $(CFLAGS) -c $< -o $@"]
///
/// [project.common]
/// dir = "common"
/// ```
///
/// The top-level keys describe the main project; `[project.<name>]` tables
/// describe additional projects it can inherit from (`bases`) or compose
/// with (`using`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRulesFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(flatten)]
    pub main: ProjectSection,

    #[serde(default)]
    pub project: BTreeMap<String, ProjectSection>,
}

/// Validated rule file.
///
/// Only constructed through `TryFrom<RawRulesFile>`, so the projects are
/// known to form an acyclic graph and are listed in dependency order, the
/// main project last.
#[derive(Debug, Clone)]
pub struct RulesFile {
    pub config: ConfigSection,
    pub projects: Vec<(String, ProjectSection)>,
}

impl RulesFile {
    pub(crate) fn new_unchecked(config: ConfigSection, projects: Vec<(String, ProjectSection)>) -> Self {
        Self { config, projects }
    }

    pub fn main(&self) -> Option<&ProjectSection> {
        self.project(MAIN_PROJECT)
    }

    pub fn project(&self, name: &str) -> Option<&ProjectSection> {
        self.projects
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of recipe processes running at once.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Build state directory, relative to the rule file.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Grep cache file. Defaults to a file under the temp directory.
    #[serde(default)]
    pub grep_cache: Option<PathBuf>,
}

fn default_jobs() -> usize {
    1
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(crate::engine::context::DEFAULT_STATE_DIR)
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            state_dir: default_state_dir(),
            grep_cache: None,
        }
    }
}

/// One project: variables, file-maps and rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSection {
    /// Project directory, relative to the rule file.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default)]
    pub bases: Vec<String>,

    #[serde(default)]
    pub using: Vec<String>,

    /// Variables in declaration order; see [`VarSpec`].
    #[serde(default)]
    pub vars: toml::Table,

    #[serde(default)]
    pub files: Vec<FileMapSpec>,

    #[serde(default)]
    pub rule: Vec<RuleSpec>,
}

/// A variable: plain text (origin `default`) or a table with an origin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VarSpec {
    Text(String),
    Int(i64),
    Bool(bool),
    Full {
        value: String,
        #[serde(default)]
        origin: DefOrigin,
    },
}

impl VarSpec {
    pub fn origin(&self) -> DefOrigin {
        match self {
            VarSpec::Full { origin, .. } => *origin,
            _ => DefOrigin::Default,
        }
    }

    pub fn text(&self) -> String {
        match self {
            VarSpec::Text(s) => s.clone(),
            VarSpec::Int(i) => i.to_string(),
            VarSpec::Bool(b) => b.to_string(),
            VarSpec::Full { value, .. } => value.clone(),
        }
    }
}

/// `[[files]]`: where names matching `pattern` are searched.
#[derive(Debug, Clone, Deserialize)]
pub struct FileMapSpec {
    pub pattern: String,
    #[serde(default)]
    pub paths: Vec<SearchPathSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SearchPathSpec {
    Path(PathBuf),
    Full {
        path: PathBuf,
        #[serde(default)]
        system: bool,
    },
}

impl SearchPathSpec {
    pub fn path(&self) -> &PathBuf {
        match self {
            SearchPathSpec::Path(p) => p,
            SearchPathSpec::Full { path, .. } => path,
        }
    }

    pub fn system(&self) -> bool {
        matches!(self, SearchPathSpec::Full { system: true, .. })
    }
}

/// `[[rule]]`: one Program for one or more targets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSpec {
    pub targets: Vec<String>,

    #[serde(default)]
    pub depends: Vec<String>,

    /// Order-only prerequisites: built first, never make the target dirty.
    #[serde(default)]
    pub ordered: Vec<String>,

    #[serde(default)]
    pub recipes: Vec<String>,

    /// `"name"` or `"name=default"`.
    #[serde(default)]
    pub params: Vec<String>,

    /// Each entry is a modifier name followed by its arguments.
    #[serde(default)]
    pub modifiers: Vec<Vec<String>>,

    #[serde(default)]
    pub language: Language,

    /// The targets are names, not files.
    #[serde(default)]
    pub phony: bool,

    /// Register as a use rule, run only through the `use` modifier.
    #[serde(default, rename = "use")]
    pub use_rule: bool,

    /// Variables local to this rule's Program.
    #[serde(default)]
    pub vars: toml::Table,
}
