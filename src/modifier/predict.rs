// src/modifier/predict.rs

//! Predicates shared by `check`, `assert`, `cond` and `case`.
//!
//! Structured predicates are `key=value` arguments:
//!
//! - `status=N`: exit status of the last recipe command,
//! - `stdout=TEXT` / `stderr=TEXT`: trimmed output equals `TEXT`, or matches
//!   it when written `re:REGEX`,
//! - `file=PATH`: the file exists (relative to the current directory),
//! - `var=NAME`: the variable is defined and true,
//! - `target=PATTERN`: the target name matches.
//!
//! Plain arguments are tested for truth (`a==b` and `a!=b` compare text), or
//! matched against the subject for `case`. Results are ANDed, or ORed with
//! `-or`. `-reason=TEXT` is reported when the prediction fails.

use regex::Regex;

use crate::engine::breaker::{BreakScope, Breaker, Flow};
use crate::engine::traversal::Traversal;
use crate::errors::Result;
use crate::pattern::Pattern;
use crate::scope::Lookup;
use crate::value::Value;

use super::Args;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub value: bool,
    /// The predicates as written.
    pub expr: String,
    /// Why the prediction failed, user-supplied reason first.
    pub reasons: Vec<String>,
}

impl Prediction {
    fn reason(&self) -> Option<String> {
        (!self.reasons.is_empty()).then(|| self.reasons.join("; "))
    }
}

pub fn predict(t: &Traversal, args: &Args, subject: Option<&str>) -> Flow<Prediction> {
    let mut results = Vec::new();
    let mut failed = Vec::new();
    let mut expr = Vec::new();

    for (key, value) in &args.pairs {
        let written = format!("{key}={}", value.strval());
        let ok = predicate(t, key, value)?;
        if !ok {
            failed.push(describe_failure(t, key, &written));
        }
        results.push(ok);
        expr.push(written);
    }
    for item in &args.items {
        let text = item.strval();
        let ok = match subject {
            Some(subject) => matches_subject(subject, &text)?,
            None => truth(item),
        };
        if !ok {
            failed.push(format!("{text} is false"));
        }
        results.push(ok);
        expr.push(text);
    }

    // No predicates: vacuously true, which makes a bare `case` the default.
    let value = if args.flag("or") {
        results.is_empty() || results.iter().any(|r| *r)
    } else {
        results.iter().all(|r| *r)
    };

    let mut reasons = Vec::new();
    if !value {
        if let Some(reason) = args.option("reason") {
            reasons.push(reason.strval());
        }
        reasons.extend(failed);
    }

    Ok(Prediction {
        value,
        expr: expr.join(" "),
        reasons,
    })
}

fn predicate(t: &Traversal, key: &str, value: &Value) -> Flow<bool> {
    let text = value.strval();
    let ok = match key {
        "status" => {
            let want = value.integer();
            t.last_exec.as_ref().is_some_and(|r| Some(i64::from(r.status)) == want)
        }
        "stdout" => {
            let out = t.last_exec.as_ref().map(|r| r.stdout.as_str()).unwrap_or_default();
            text_matches(out, &text)?
        }
        "stderr" => {
            let out = t.last_exec.as_ref().map(|r| r.stderr.as_str()).unwrap_or_default();
            text_matches(out, &text)?
        }
        "file" => t.dirs.current().join(&text).exists(),
        "var" => match t.find_def(&text) {
            Some(def) => def.value().expand(t).map(|v| v.is_true()).unwrap_or(false),
            None => false,
        },
        "target" => matches_subject(&t.target_name(), &text)?,
        other => return Err(Breaker::fail(format!("unknown predicate '{other}'"))),
    };
    Ok(ok)
}

fn describe_failure(t: &Traversal, key: &str, written: &str) -> String {
    match (key, &t.last_exec) {
        ("status", Some(r)) => format!("{written} (got {})", r.status),
        ("status", None) => format!("{written} (nothing was run)"),
        _ => format!("{written} does not hold"),
    }
}

fn text_matches(actual: &str, want: &str) -> Result<bool> {
    match want.strip_prefix("re:") {
        Some(expr) => Ok(Regex::new(expr)?.is_match(actual)),
        None => Ok(actual.trim() == want.trim()),
    }
}

fn matches_subject(subject: &str, text: &str) -> Result<bool> {
    if Pattern::classify(text).is_some() {
        return Ok(Pattern::parse(text)?.matches(subject).is_some());
    }
    Ok(subject == text)
}

fn truth(item: &Value) -> bool {
    let text = item.strval();
    if let Some((a, b)) = text.split_once("==") {
        return a.trim() == b.trim();
    }
    if let Some((a, b)) = text.split_once("!=") {
        return a.trim() != b.trim();
    }
    item.is_true()
}

/// Validate the last execution. Without predicates, its status must be 0.
/// With `-bool` the outcome is returned instead of failing.
pub fn check(t: &Traversal, args: &Args) -> Flow<Value> {
    let prediction = if args.pairs.is_empty() && args.items.is_empty() {
        let ok = t.last_exec.as_ref().is_none_or(|r| r.success());
        Prediction {
            value: ok,
            expr: "status=0".to_string(),
            reasons: Vec::new(),
        }
    } else {
        predict(t, args, None)?
    };

    if args.flag("bool") {
        return Ok(Value::Bool(prediction.value));
    }
    if !prediction.value {
        let message = match prediction.reason() {
            Some(reason) => format!("check failed: {}: {reason}", prediction.expr),
            None => format!("check failed: {}", prediction.expr),
        };
        return Err(Breaker::fail(message));
    }
    Ok(t.buffer.clone())
}

pub fn assert(t: &Traversal, args: &Args) -> Flow<Value> {
    let prediction = predict(t, args, None)?;
    if !prediction.value {
        let message = match args.option("reason") {
            Some(reason) => format!("assertion failed: {}: {}", prediction.expr, reason.strval()),
            None => format!("assertion failed: {}", prediction.expr),
        };
        return Err(Breaker::fail(message));
    }
    Ok(t.buffer.clone())
}

/// Skip the rest of the group unless the prediction holds.
pub fn cond(t: &Traversal, args: &Args) -> Flow<Value> {
    if predict(t, args, None)?.value {
        Ok(t.buffer.clone())
    } else {
        Err(Breaker::done(BreakScope::Group))
    }
}

/// Select this Program when the subject (`-subject=`, default the target
/// name) matches any of the arguments; otherwise move to the next Program.
pub fn case(t: &Traversal, args: &Args) -> Flow<Value> {
    let subject = match args.option("subject") {
        Some(v) => v.strval(),
        None => t.target_name(),
    };
    let mut any = args.clone();
    if !any.flag("and") {
        any.flags.push("or".to_string());
    }
    if predict(t, &any, Some(&subject))?.value {
        Err(Breaker::case(subject))
    } else {
        Err(Breaker::next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_match_supports_regex_prefix() {
        assert!(text_matches("hello world\n", "hello world").unwrap());
        assert!(text_matches("build ok: 3 files", "re:ok: \\d+").unwrap());
        assert!(!text_matches("nope", "re:^ok").unwrap());
    }

    #[test]
    fn subject_matching_uses_patterns() {
        assert!(matches_subject("src/main.o", "%.o").unwrap());
        assert!(matches_subject("debug", "debug").unwrap());
        assert!(!matches_subject("release", "debug").unwrap());
    }

    #[test]
    fn truth_compares_text() {
        assert!(truth(&Value::str("a == a")));
        assert!(truth(&Value::str("a!=b")));
        assert!(!truth(&Value::str("")));
    }
}
