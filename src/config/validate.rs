// src/config/validate.rs

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{MAIN_PROJECT, ProjectSection, RawRulesFile, RulesFile, VarSpec};
use crate::errors::{Result, RuleError};
use crate::modifier;

impl TryFrom<RawRulesFile> for RulesFile {
    type Error = RuleError;

    fn try_from(raw: RawRulesFile) -> std::result::Result<Self, Self::Error> {
        let mut projects = raw.project;
        if projects.contains_key(MAIN_PROJECT) {
            return Err(RuleError::Config(format!(
                "[project.{MAIN_PROJECT}] is reserved for the top-level project"
            )));
        }
        projects.insert(MAIN_PROJECT.to_string(), raw.main);

        validate_global_config(&raw.config)?;
        for (name, project) in &projects {
            validate_project(name, project, &projects)?;
        }
        let order = project_order(&projects)?;

        let ordered = order
            .into_iter()
            .filter_map(|name| projects.remove(&name).map(|p| (name, p)))
            .collect();
        Ok(RulesFile::new_unchecked(raw.config, ordered))
    }
}

fn validate_global_config(cfg: &crate::config::model::ConfigSection) -> Result<()> {
    if cfg.jobs == 0 {
        return Err(RuleError::Config(
            "[config].jobs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_project(name: &str, project: &ProjectSection, all: &BTreeMap<String, ProjectSection>) -> Result<()> {
    for (kind, other) in project
        .bases
        .iter()
        .map(|b| ("bases", b))
        .chain(project.using.iter().map(|u| ("using", u)))
    {
        if other == name {
            return Err(RuleError::Config(format!(
                "project '{name}' cannot list itself in `{kind}`"
            )));
        }
        if !all.contains_key(other) {
            return Err(RuleError::Config(format!(
                "project '{name}' has unknown project '{other}' in `{kind}`"
            )));
        }
    }

    validate_vars(name, &project.vars)?;

    for (i, rule) in project.rule.iter().enumerate() {
        if rule.targets.is_empty() || rule.targets.iter().any(|t| t.trim().is_empty()) {
            return Err(RuleError::Config(format!(
                "rule #{} of project '{name}' needs at least one non-empty target",
                i + 1
            )));
        }
        for call in &rule.modifiers {
            match call.first() {
                Some(m) if modifier::is_known(m) => {}
                Some(m) => {
                    return Err(RuleError::Config(format!(
                        "rule '{}' uses unknown modifier '{m}'",
                        rule.targets[0]
                    )));
                }
                None => {
                    return Err(RuleError::Config(format!(
                        "rule '{}' has an empty modifier entry",
                        rule.targets[0]
                    )));
                }
            }
        }
        for param in &rule.params {
            let pname = param.split_once('=').map_or(param.as_str(), |(n, _)| n);
            if pname.trim().is_empty() {
                return Err(RuleError::Config(format!(
                    "rule '{}' has a parameter without a name",
                    rule.targets[0]
                )));
            }
        }
        validate_vars(name, &rule.vars)?;
    }
    Ok(())
}

fn validate_vars(project: &str, vars: &toml::Table) -> Result<()> {
    for (key, value) in vars {
        if let Err(err) = value.clone().try_into::<VarSpec>() {
            return Err(RuleError::Config(format!(
                "variable '{key}' in project '{project}': {err}"
            )));
        }
    }
    Ok(())
}

/// Projects in construction order: every project after its bases and
/// `using` projects.
fn project_order(projects: &BTreeMap<String, ProjectSection>) -> Result<Vec<String>> {
    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in projects.keys() {
        graph.add_node(name.as_str());
    }
    for (name, project) in projects {
        for dep in project.bases.iter().chain(project.using.iter()) {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(RuleError::ProjectCycle(format!(
            "cycle detected in project graph involving project '{}'",
            cycle.node_id()
        ))),
    }
}
