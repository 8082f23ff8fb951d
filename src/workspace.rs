// src/workspace.rs

//! From a validated rule file to live projects, and building goals.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ProjectSection, RuleSpec, RulesFile, VarSpec, load_and_validate};
use crate::engine::breaker::BreakKind;
use crate::engine::context::{Context, ContextOptions};
use crate::engine::diagnostics::Diagnostic;
use crate::engine::program::{Param, Program, ProgramSpec};
use crate::engine::traversal::Invocation;
use crate::errors::{Result, RuleError};
use crate::modifier::ModifierCall;
use crate::pattern::{FileMap, SearchPath};
use crate::project::Project;
use crate::scope::Scope;
use crate::types::Position;
use crate::value::{Value, parse_arg, parse_text};

/// Command-line overrides of the `[config]` section.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceOptions {
    pub dry_run: bool,
    pub jobs: Option<usize>,
}

/// What building a list of goals did.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub updated: Vec<String>,
    pub up_to_date: Vec<String>,
    pub failed: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Errors over the per-goal cap, counted but not kept.
    pub dropped: usize,
    /// Some Error or Fail diagnostic was raised during the run.
    pub errors: bool,
}

impl BuildReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && !self.errors
    }
}

pub struct Workspace {
    ctx: Arc<Context>,
    file: String,
    projects: HashMap<String, Arc<Project>>,
    main: Arc<Project>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("file", &self.file)
            .field("main", &self.main.name())
            .finish_non_exhaustive()
    }
}

/// Context options for a rule file living in `root`.
pub fn context_options(rules: &RulesFile, root: &Path, options: &WorkspaceOptions) -> ContextOptions {
    ContextOptions {
        dry_run: options.dry_run,
        jobs: options.jobs.unwrap_or(rules.config.jobs),
        state_dir: root.join(&rules.config.state_dir),
        grep_cache: rules.config.grep_cache.as_ref().map(|p| root.join(p)),
    }
}

impl Workspace {
    /// Load `path` and build its projects with the real executor.
    pub fn load(path: &Path, options: WorkspaceOptions) -> Result<Self> {
        let rules = load_and_validate(path)?;
        let root = rule_file_root(path);
        let ctx = Context::new(context_options(&rules, &root, &options));
        Self::from_rules(&rules, &root, &path.display().to_string(), ctx)
    }

    /// Build the projects of `rules` into `ctx`. Relative project
    /// directories are taken relative to `root`.
    pub fn from_rules(rules: &RulesFile, root: &Path, file: &str, ctx: Arc<Context>) -> Result<Self> {
        let mut projects: HashMap<String, Arc<Project>> = HashMap::new();
        for (name, section) in &rules.projects {
            let project = build_project(&ctx, root, file, name, section, &projects)?;
            projects.insert(name.clone(), project);
        }
        let main = projects
            .get(crate::config::MAIN_PROJECT)
            .cloned()
            .ok_or_else(|| RuleError::Config("rule file has no main project".to_string()))?;

        Ok(Self {
            ctx,
            file: file.to_string(),
            projects,
            main,
        })
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn main(&self) -> &Arc<Project> {
        &self.main
    }

    pub fn project(&self, name: &str) -> Option<&Arc<Project>> {
        self.projects.get(name)
    }

    /// First concrete rule of the main project.
    pub fn default_goal(&self) -> Option<String> {
        self.main
            .concrete_entries()
            .first()
            .map(|e| e.name().to_string())
    }

    /// Build `goals` in order, or the default goal when none are given.
    ///
    /// Diagnostics are drained and printed after each goal; the grep cache
    /// is saved at the end.
    pub async fn build(&self, goals: &[String]) -> BuildReport {
        let mut report = BuildReport::default();
        let goals: Vec<String> = if goals.is_empty() {
            self.default_goal().into_iter().collect()
        } else {
            goals.to_vec()
        };
        if goals.is_empty() {
            self.ctx
                .diagnostics()
                .error(Position::new(&self.file, ""), "no goals and no default rule");
            let (entries, _) = self.ctx.diagnostics().drain();
            for d in &entries {
                eprintln!("{d}");
            }
            report.diagnostics.extend(entries);
        }

        for goal in &goals {
            match self.build_goal(goal).await {
                Some(true) => report.updated.push(goal.clone()),
                Some(false) => {
                    println!("rulemake: '{goal}' is up to date.");
                    report.up_to_date.push(goal.clone());
                }
                None => report.failed.push(goal.clone()),
            }
            let (entries, dropped) = self.ctx.diagnostics().drain();
            for d in &entries {
                eprintln!("{d}");
            }
            if dropped > 0 {
                eprintln!("rulemake: {dropped} more errors not shown");
            }
            report.diagnostics.extend(entries);
            report.dropped += dropped;
        }

        if let Err(err) = self.ctx.finish() {
            tracing::warn!(error = %err, "failed to save grep cache");
        }
        report.errors = self.ctx.diagnostics().has_errors();
        report
    }

    /// `Some(updated)` on success, `None` when the goal failed.
    async fn build_goal(&self, goal: &str) -> Option<bool> {
        let position = Position::new(&self.file, goal);
        let Some(realized) = self.main.resolve_goal(goal) else {
            self.ctx
                .diagnostics()
                .error(position, RuleError::NoRule { target: goal.to_string() }.to_string());
            return None;
        };

        info!(goal = %goal, "building");
        let inv = Invocation::root(realized.target, realized.stems);
        match realized.entry.traverse(&self.ctx, inv).await {
            Ok(outcome) => Some(outcome.updated),
            Err(b) => match b.kind {
                BreakKind::Done | BreakKind::Case => Some(false),
                BreakKind::Next => {
                    self.ctx
                        .diagnostics()
                        .error(position, format!("no program of '{goal}' applies"));
                    None
                }
                BreakKind::Fail | BreakKind::Error | BreakKind::Unknown => {
                    if !b.reported {
                        self.ctx.diagnostics().error(position, b.to_string());
                    }
                    None
                }
            },
        }
    }

    /// Print every project's variables and rules.
    pub fn print_rules(&self) {
        let mut names: Vec<&String> = self.projects.keys().collect();
        names.sort();
        for name in names {
            let project = &self.projects[name];
            println!("project {} ({})", name, project.dir().display());
            for var in project.scope().names() {
                if let Some(def) = project.scope().find_def_local(&var) {
                    println!("  {var} = {}", def.value().strval());
                }
            }
            let entries = project
                .concrete_entries()
                .into_iter()
                .chain(project.pattern_entries())
                .chain(project.use_entries());
            for entry in entries {
                let phony = if entry.is_phony() { " (phony)" } else { "" };
                println!(
                    "  {:?} {}{phony}: {} program(s)",
                    entry.class(),
                    entry.name(),
                    entry.programs().len()
                );
            }
        }
    }
}

/// Directory of the rule file, or `.` for a bare file name.
pub fn rule_file_root(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn build_project(
    ctx: &Arc<Context>,
    root: &Path,
    file: &str,
    name: &str,
    section: &ProjectSection,
    built: &HashMap<String, Arc<Project>>,
) -> Result<Arc<Project>> {
    let lookup = |names: &[String]| -> Result<Vec<Arc<Project>>> {
        names
            .iter()
            .map(|n| {
                built.get(n).cloned().ok_or_else(|| {
                    RuleError::Config(format!("project '{name}' refers to '{n}' before it is built"))
                })
            })
            .collect()
    };
    let dir = match &section.dir {
        Some(d) => root.join(d),
        None => root.to_path_buf(),
    };
    let project = Project::new(name, dir, ctx.globals(), lookup(&section.bases)?, lookup(&section.using)?);

    assign_vars(project.scope(), &section.vars)?;

    for spec in &section.files {
        let paths = spec
            .paths
            .iter()
            .map(|p| SearchPath::new(p.path().clone(), p.system()))
            .collect();
        project.add_file_map(FileMap::from_text(&spec.pattern, paths)?);
    }

    for rule in &section.rule {
        let program = Program::new(&project, program_spec(file, rule));
        assign_vars(program.scope(), &rule.vars)?;
        project.declare(&rule.targets, rule.use_rule, rule.phony, program)?;
    }

    debug!(project = %name, rules = section.rule.len(), "project built");
    Ok(project)
}

fn assign_vars(scope: &Arc<Scope>, vars: &toml::Table) -> Result<()> {
    for (key, value) in vars {
        let spec: VarSpec = value
            .clone()
            .try_into()
            .map_err(|e| RuleError::Config(format!("variable '{key}': {e}")))?;
        scope.assign(key, spec.origin(), parse_text(&spec.text()))?;
    }
    Ok(())
}

fn program_spec(file: &str, rule: &RuleSpec) -> ProgramSpec {
    let texts = |items: &[String]| items.iter().map(|s| parse_text(s)).collect::<Vec<Value>>();
    ProgramSpec {
        params: rule
            .params
            .iter()
            .map(|p| match p.split_once('=') {
                Some((name, default)) => Param {
                    name: name.trim().to_string(),
                    default: parse_text(default),
                },
                None => Param {
                    name: p.trim().to_string(),
                    default: Value::None,
                },
            })
            .collect(),
        depends: texts(&rule.depends),
        ordered: texts(&rule.ordered),
        recipes: texts(&rule.recipes),
        modifiers: rule
            .modifiers
            .iter()
            .filter_map(|call| {
                let (name, args) = call.split_first()?;
                Some(ModifierCall::new(name.clone(), args.iter().map(|a| parse_arg(a)).collect()))
            })
            .collect(),
        language: rule.language,
        position: Position::new(file, rule.targets.join(" ")),
    }
}
