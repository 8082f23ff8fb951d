// src/pattern/mod.rs

//! Stem-capturing patterns.
//!
//! Four pattern shapes share one matcher:
//!
//! - percent patterns (`%.o`): each `%` captures one stem,
//! - path patterns (`obj/%.o`): percent patterns spanning several components,
//! - glob patterns (`*.txt`): each `*` captures one stem,
//! - regexp patterns (`re:^(.*)\.o$`): capture groups are the stems.
//!
//! Matching splits both pattern and candidate on `/` and compares component
//! by component. A single-component pattern is matched against the last
//! component of the candidate only; the remaining components are returned as
//! the prefix.

pub mod filemap;

use std::fmt;

use regex::Regex;

use crate::errors::{Result, RuleError};

pub use filemap::{FileMap, FileMatch, MapPattern, SearchPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Percent,
    Path,
    Glob,
    Regexp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Lit(String),
    /// `%`
    Stem,
    /// `*`
    Star,
    /// `?`
    Any,
    /// `[...]`, stored without the brackets.
    Class(String),
}

#[derive(Debug, Clone)]
struct Component {
    tokens: Vec<Token>,
    regex: Regex,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
    components: Vec<Component>,
    /// Only set for `Regexp` patterns.
    whole: Option<Regex>,
}

/// Outcome of a successful [`Pattern::matches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// The part of the candidate the pattern consumed.
    pub matched: String,
    /// Leading components left over by a single-component pattern.
    pub prefix: String,
    pub stems: Vec<String>,
}

/// Outcome of [`Pattern::stencil`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stencil {
    pub text: String,
    /// Placeholders left in `text` because there were not enough stems.
    pub unmet: usize,
    /// Stems that found no placeholder.
    pub unused: Vec<String>,
}

impl Stencil {
    pub fn is_complete(&self) -> bool {
        self.unmet == 0
    }
}

impl Pattern {
    /// Shape of `text` if it is a pattern at all.
    pub fn classify(text: &str) -> Option<PatternKind> {
        if text.starts_with("re:") {
            return Some(PatternKind::Regexp);
        }
        if text.contains('%') {
            return Some(if text.contains('/') {
                PatternKind::Path
            } else {
                PatternKind::Percent
            });
        }
        if text.contains(['*', '?', '[']) {
            return Some(PatternKind::Glob);
        }
        None
    }

    pub fn parse(text: &str) -> Result<Self> {
        let kind = Self::classify(text).ok_or_else(|| RuleError::Pattern {
            pattern: text.to_string(),
            reason: "no placeholder".to_string(),
        })?;

        if kind == PatternKind::Regexp {
            let expr = &text["re:".len()..];
            let whole = Regex::new(&anchored(expr))?;
            return Ok(Self {
                source: text.to_string(),
                kind,
                components: Vec::new(),
                whole: Some(whole),
            });
        }

        let components = text
            .split('/')
            .map(|part| compile_component(text, part, kind))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source: text.to_string(),
            kind,
            components,
            whole: None,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// Number of stem placeholders.
    pub fn placeholders(&self) -> usize {
        match &self.whole {
            Some(re) => re.captures_len() - 1,
            None => self
                .components
                .iter()
                .flat_map(|c| &c.tokens)
                .filter(|t| self.is_placeholder(t))
                .count(),
        }
    }

    fn is_placeholder(&self, token: &Token) -> bool {
        match self.kind {
            PatternKind::Glob => *token == Token::Star,
            PatternKind::Percent | PatternKind::Path => *token == Token::Stem,
            PatternKind::Regexp => false,
        }
    }

    pub fn matches(&self, candidate: &str) -> Option<PatternMatch> {
        let candidate = candidate.strip_prefix("./").unwrap_or(candidate);

        if let Some(re) = &self.whole {
            let caps = re.captures(candidate)?;
            let stems = caps
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();
            return Some(PatternMatch {
                matched: candidate.to_string(),
                prefix: String::new(),
                stems,
            });
        }

        let parts: Vec<&str> = candidate.split('/').collect();
        let (prefix, parts) = if self.components.len() == 1 {
            let (last, init) = parts.split_last()?;
            (init.join("/"), vec![*last])
        } else if self.components.len() == parts.len() {
            (String::new(), parts)
        } else {
            return None;
        };

        let mut stems = Vec::new();
        for (component, part) in self.components.iter().zip(&parts) {
            let caps = component.regex.captures(part)?;
            stems.extend(caps.iter().skip(1).flatten().map(|m| m.as_str().to_string()));
        }

        Some(PatternMatch {
            matched: parts.join("/"),
            prefix,
            stems,
        })
    }

    /// Substitute `stems` into the placeholders, left to right.
    ///
    /// Regexp patterns have no placeholders to fill; their source comes back
    /// unchanged with every stem unused.
    pub fn stencil(&self, stems: &[String]) -> Stencil {
        if self.whole.is_some() {
            return Stencil {
                text: self.source.clone(),
                unmet: 0,
                unused: stems.to_vec(),
            };
        }

        let mut supply = stems.iter();
        let mut unmet = 0;
        let mut parts = Vec::with_capacity(self.components.len());
        for component in &self.components {
            let mut text = String::new();
            for token in &component.tokens {
                if self.is_placeholder(token) {
                    match supply.next() {
                        Some(stem) => text.push_str(stem),
                        None => {
                            unmet += 1;
                            text.push_str(token_source(token).as_str());
                        }
                    }
                } else {
                    text.push_str(token_source(token).as_str());
                }
            }
            parts.push(text);
        }

        Stencil {
            text: parts.join("/"),
            unmet,
            unused: supply.cloned().collect(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn anchored(expr: &str) -> String {
    let expr = expr.strip_prefix('^').unwrap_or(expr);
    let expr = expr.strip_suffix('$').unwrap_or(expr);
    format!("^(?:{expr})$")
}

fn compile_component(source: &str, part: &str, kind: PatternKind) -> Result<Component> {
    let tokens = tokenize(source, part)?;
    let mut expr = String::from("^");
    for token in &tokens {
        match token {
            Token::Lit(s) => expr.push_str(&regex::escape(s)),
            Token::Stem => expr.push_str("(.+?)"),
            Token::Star if kind == PatternKind::Glob => expr.push_str("(.*?)"),
            Token::Star => expr.push_str(".*?"),
            Token::Any => expr.push('.'),
            Token::Class(class) => {
                expr.push('[');
                match class.strip_prefix('!') {
                    Some(negated) => {
                        expr.push('^');
                        expr.push_str(&escape_class(negated));
                    }
                    None => expr.push_str(&escape_class(class)),
                }
                expr.push(']');
            }
        }
    }
    expr.push('$');
    Ok(Component {
        tokens,
        regex: Regex::new(&expr)?,
    })
}

fn tokenize(source: &str, part: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut lit = String::new();
    let mut chars = part.chars();

    while let Some(c) = chars.next() {
        let token = match c {
            '%' => Token::Stem,
            '*' => Token::Star,
            '?' => Token::Any,
            '[' => {
                let mut class = String::new();
                loop {
                    match chars.next() {
                        Some(']') if !class.is_empty() => break,
                        Some(c) => class.push(c),
                        None => {
                            return Err(RuleError::Pattern {
                                pattern: source.to_string(),
                                reason: "unterminated character class".to_string(),
                            });
                        }
                    }
                }
                Token::Class(class)
            }
            '\\' => {
                lit.push(chars.next().unwrap_or('\\'));
                continue;
            }
            other => {
                lit.push(other);
                continue;
            }
        };
        if !lit.is_empty() {
            tokens.push(Token::Lit(std::mem::take(&mut lit)));
        }
        tokens.push(token);
    }
    if !lit.is_empty() {
        tokens.push(Token::Lit(lit));
    }
    Ok(tokens)
}

fn escape_class(class: &str) -> String {
    class
        .chars()
        .map(|c| match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => format!("\\{c}"),
            c => c.to_string(),
        })
        .collect()
}

fn token_source(token: &Token) -> String {
    match token {
        Token::Lit(s) => s.clone(),
        Token::Stem => "%".to_string(),
        Token::Star => "*".to_string(),
        Token::Any => "?".to_string(),
        Token::Class(class) => format!("[{class}]"),
    }
}
