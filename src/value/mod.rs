// src/value/mod.rs

//! Dynamic values manipulated by the rule engine.
//!
//! The engine only relies on a fixed capability set: string conversion,
//! truthiness, integer conversion, comparison, existence, timestamps and
//! expansion of delegated references. Everything else is a structural match
//! on the variant.

pub mod file;
pub mod parse;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::time::SystemTime;

use crate::errors::{Result, RuleError};
use crate::exec::ExecResult;
use crate::pattern::Pattern;
use crate::scope::Lookup;

pub use file::{File, FileInfo};
pub use parse::{parse_arg, parse_text};

/// Maximum nesting of references followed while expanding a single value.
const MAX_EXPAND_DEPTH: usize = 64;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    /// Scalar text (bare words, quoted strings).
    Str(String),
    Int(i64),
    Bool(bool),
    /// A `-name` option argument.
    Flag(String),
    /// `key=value`.
    Pair(Box<Value>, Box<Value>),
    /// Space separated list.
    List(Vec<Value>),
    /// Parenthesised group.
    Group(Vec<Value>),
    /// Text built from several parts, e.g. `lib$(NAME).a`.
    Compound(Vec<Value>),
    /// Delegated reference to a definition, `$(name)` or `$@`.
    Ref(String),
    /// Nested rule invocation, `$(=> target args...)`.
    Invoke { target: Box<Value>, args: Vec<Value> },
    Pattern(Pattern),
    File(File),
    /// Outcome of a recipe command.
    Exec(ExecResult),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Flat string form of the value.
    pub fn strval(&self) -> String {
        match self {
            Value::None => String::new(),
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Flag(name) => format!("-{name}"),
            Value::Pair(k, v) => format!("{}={}", k.strval(), v.strval()),
            Value::List(items) => join_strvals(items, " "),
            Value::Group(items) => format!("({})", join_strvals(items, " ")),
            Value::Compound(parts) => parts.iter().map(Value::strval).collect(),
            Value::Ref(name) if name.chars().count() == 1 => format!("${name}"),
            Value::Ref(name) => format!("$({name})"),
            Value::Invoke { target, args } => {
                if args.is_empty() {
                    format!("$(=> {})", target.strval())
                } else {
                    format!("$(=> {} {})", target.strval(), join_strvals(args, " "))
                }
            }
            Value::Pattern(p) => p.source().to_string(),
            Value::File(f) => f.path().to_string_lossy().into_owned(),
            Value::Exec(r) => r.stdout.trim_end().to_string(),
        }
    }

    pub fn is_true(&self) -> bool {
        match self {
            Value::None => false,
            Value::Str(s) => !s.is_empty() && s != "false" && s != "0",
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::Flag(_) | Value::Pattern(_) => true,
            Value::Pair(_, v) => v.is_true(),
            Value::List(items) | Value::Group(items) => !items.is_empty(),
            Value::Compound(parts) => parts.iter().any(Value::is_true),
            Value::Ref(_) | Value::Invoke { .. } => true,
            Value::File(f) => f.exists(),
            Value::Exec(r) => r.success(),
        }
    }

    pub fn integer(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Exec(r) => Some(i64::from(r.status)),
            other => other.strval().trim().parse().ok(),
        }
    }

    /// Compare two values; integers compare numerically, everything else by
    /// string form.
    pub fn cmp(&self, other: &Value) -> Ordering {
        let both_text = matches!((self, other), (Value::Str(_), Value::Str(_)));
        match (self.integer(), other.integer()) {
            (Some(a), Some(b)) if !both_text => a.cmp(&b),
            _ => self.strval().cmp(&other.strval()),
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            Value::File(f) => f.exists(),
            Value::None => false,
            other => !other.strval().is_empty(),
        }
    }

    /// Modification time, only meaningful for files.
    pub fn stamp(&self) -> Option<SystemTime> {
        match self {
            Value::File(f) => f.modified(),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Value::File(f) => Some(f),
            _ => None,
        }
    }

    /// Items of a list-like value; scalars are a one-item list, `None` is
    /// empty.
    pub fn items(&self) -> Vec<Value> {
        match self {
            Value::None => Vec::new(),
            Value::List(items) | Value::Group(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// Expand delegated references against `lookup`.
    ///
    /// Nested rule invocations are left untouched; they can only be resolved
    /// by a running traversal.
    pub fn expand(&self, lookup: &dyn Lookup) -> Result<Value> {
        let mut stack = Vec::new();
        self.expand_with(lookup, &mut stack)
    }

    fn expand_with(&self, lookup: &dyn Lookup, stack: &mut Vec<String>) -> Result<Value> {
        match self {
            Value::Ref(name) => {
                if stack.iter().any(|n| n == name) || stack.len() >= MAX_EXPAND_DEPTH {
                    return Err(RuleError::CyclicBinding { name: name.clone() });
                }
                let def = lookup
                    .find_def(name)
                    .ok_or_else(|| RuleError::Undefined { name: name.clone() })?;
                stack.push(name.clone());
                let expanded = def.value().expand_with(lookup, stack);
                stack.pop();
                expanded
            }
            Value::Compound(parts) => {
                let mut text = String::new();
                for part in parts {
                    text.push_str(&part.expand_with(lookup, stack)?.strval());
                }
                Ok(Value::Str(text))
            }
            Value::List(items) => Ok(Value::List(expand_all(items, lookup, stack)?)),
            Value::Group(items) => Ok(Value::Group(expand_all(items, lookup, stack)?)),
            Value::Pair(k, v) => Ok(Value::Pair(
                Box::new(k.expand_with(lookup, stack)?),
                Box::new(v.expand_with(lookup, stack)?),
            )),
            other => Ok(other.clone()),
        }
    }

    /// Whether this value (transitively, through `lookup`) references `name`.
    pub fn references(&self, name: &str, lookup: &dyn Lookup) -> bool {
        let mut seen = HashSet::new();
        self.references_inner(name, lookup, &mut seen)
    }

    fn references_inner(&self, name: &str, lookup: &dyn Lookup, seen: &mut HashSet<String>) -> bool {
        match self {
            Value::Ref(r) => {
                if r == name {
                    return true;
                }
                if !seen.insert(r.clone()) {
                    return false;
                }
                match lookup.find_def(r) {
                    Some(def) => def.value().references_inner(name, lookup, seen),
                    None => false,
                }
            }
            Value::Compound(items) | Value::List(items) | Value::Group(items) => {
                items.iter().any(|v| v.references_inner(name, lookup, seen))
            }
            Value::Pair(k, v) => {
                k.references_inner(name, lookup, seen) || v.references_inner(name, lookup, seen)
            }
            Value::Invoke { target, args } => {
                target.references_inner(name, lookup, seen)
                    || args.iter().any(|v| v.references_inner(name, lookup, seen))
            }
            _ => false,
        }
    }
}

fn expand_all(items: &[Value], lookup: &dyn Lookup, stack: &mut Vec<String>) -> Result<Vec<Value>> {
    items.iter().map(|v| v.expand_with(lookup, stack)).collect()
}

fn join_strvals(items: &[Value], sep: &str) -> String {
    items
        .iter()
        .map(Value::strval)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.strval())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::File(a), Value::File(b)) => a.path() == b.path(),
            (Value::None, Value::None) => true,
            (Value::None, _) | (_, Value::None) => false,
            (a, b) => a.strval() == b.strval(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<File> for Value {
    fn from(f: File) -> Self {
        Value::File(f)
    }
}
