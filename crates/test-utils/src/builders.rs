#![allow(dead_code)]

use rulemake::config::{FileMapSpec, RawRulesFile, RuleSpec, RulesFile, SearchPathSpec};
use rulemake::types::Language;

/// Builder for `RulesFile` to simplify test setup.
pub struct RulesFileBuilder {
    rules: RawRulesFile,
}

impl RulesFileBuilder {
    pub fn new() -> Self {
        Self {
            rules: RawRulesFile::default(),
        }
    }

    pub fn with_rule(mut self, rule: RuleSpec) -> Self {
        self.rules.main.rule.push(rule);
        self
    }

    /// Default-origin variable of the main project.
    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.rules
            .main
            .vars
            .insert(name.to_string(), toml::Value::String(value.to_string()));
        self
    }

    /// File-map of the main project; each path is `(dir, system)`.
    pub fn with_file_map(mut self, pattern: &str, paths: &[(&str, bool)]) -> Self {
        let paths = paths
            .iter()
            .map(|(path, system)| SearchPathSpec::Full {
                path: path.into(),
                system: *system,
            })
            .collect();
        self.rules.main.files.push(FileMapSpec {
            pattern: pattern.to_string(),
            paths,
        });
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.rules.config.jobs = jobs;
        self
    }

    pub fn build(self) -> RulesFile {
        RulesFile::try_from(self.rules).expect("Failed to build valid rule file from builder")
    }
}

impl Default for RulesFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RuleSpec`.
pub struct RuleBuilder {
    rule: RuleSpec,
}

impl RuleBuilder {
    pub fn new(target: &str) -> Self {
        Self {
            rule: RuleSpec {
                targets: vec![target.to_string()],
                ..RuleSpec::default()
            },
        }
    }

    pub fn target(mut self, target: &str) -> Self {
        self.rule.targets.push(target.to_string());
        self
    }

    pub fn depends(mut self, dep: &str) -> Self {
        self.rule.depends.push(dep.to_string());
        self
    }

    pub fn ordered(mut self, dep: &str) -> Self {
        self.rule.ordered.push(dep.to_string());
        self
    }

    pub fn recipe(mut self, recipe: &str) -> Self {
        self.rule.recipes.push(recipe.to_string());
        self
    }

    pub fn param(mut self, param: &str) -> Self {
        self.rule.params.push(param.to_string());
        self
    }

    /// A modifier call: name followed by its arguments.
    pub fn modifier(mut self, call: &[&str]) -> Self {
        self.rule
            .modifiers
            .push(call.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.rule.language = language;
        self
    }

    pub fn phony(mut self) -> Self {
        self.rule.phony = true;
        self
    }

    pub fn use_rule(mut self) -> Self {
        self.rule.use_rule = true;
        self
    }

    pub fn build(self) -> RuleSpec {
        self.rule
    }
}
