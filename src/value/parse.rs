// src/value/parse.rs

//! Turning rule-file text into [`Value`]s.
//!
//! Supported forms:
//! - `$(name)` / `$(project::name)`: delegated reference
//! - `$@ $* $< $^ $| $~ $? $-`: automatic variables
//! - `$(=> target args...)`: nested rule invocation
//! - `$$`: a literal dollar sign

use super::Value;

/// Names of the automatic variables bound by every traversal.
pub const AUTO_VARS: [char; 8] = ['@', '*', '<', '^', '|', '~', '?', '-'];

/// Parse a text fragment into a value, splitting out references.
pub fn parse_text(text: &str) -> Value {
    let mut parts = Vec::new();
    let mut lit = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            lit.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some((_, '$')) => {
                chars.next();
                lit.push('$');
            }
            Some((_, a)) if AUTO_VARS.contains(&a) => {
                chars.next();
                flush(&mut lit, &mut parts);
                parts.push(Value::Ref(a.to_string()));
            }
            Some((open, '(')) => match matching_paren(text, open) {
                Some(close) => {
                    flush(&mut lit, &mut parts);
                    parts.push(parse_reference(&text[open + 1..close]));
                    while chars.peek().is_some_and(|&(j, _)| j <= close) {
                        chars.next();
                    }
                }
                None => {
                    lit.push_str(&text[i..]);
                    break;
                }
            },
            _ => lit.push(c),
        }
    }
    flush(&mut lit, &mut parts);

    match parts.len() {
        0 => Value::Str(String::new()),
        1 => parts.pop().unwrap_or_default(),
        _ => Value::Compound(parts),
    }
}

/// Parse a modifier argument: `-flag`, `key=value`, or plain text.
pub fn parse_arg(text: &str) -> Value {
    if let Some((key, value)) = text.split_once('=') {
        // `a==b` is a comparison, not a pair.
        if is_word(key.trim_start_matches('-')) && !value.starts_with('=') {
            let key = match key.strip_prefix('-') {
                Some(flag) => Value::Flag(flag.to_string()),
                None => Value::Str(key.to_string()),
            };
            return Value::Pair(Box::new(key), Box::new(parse_text(value)));
        }
    }
    if let Some(flag) = text.strip_prefix('-') {
        if is_word(flag) {
            return Value::Flag(flag.to_string());
        }
    }
    parse_text(text)
}

fn parse_reference(inner: &str) -> Value {
    let inner = inner.trim();
    if let Some(call) = inner.strip_prefix("=>") {
        let mut words = call.split_whitespace();
        let target = words.next().map(parse_text).unwrap_or_default();
        let args = words.map(parse_arg).collect();
        return Value::Invoke {
            target: Box::new(target),
            args,
        };
    }
    Value::Ref(inner.to_string())
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn flush(lit: &mut String, parts: &mut Vec<Value>) {
    if !lit.is_empty() {
        parts.push(Value::Str(std::mem::take(lit)));
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_stays_scalar() {
        assert!(matches!(parse_text("cc -O2"), Value::Str(s) if s == "cc -O2"));
    }

    #[test]
    fn references_and_autos_are_split_out() {
        let v = parse_text("$(CC) -c $< -o $@");
        let Value::Compound(parts) = v else {
            panic!("expected compound");
        };
        assert!(matches!(&parts[0], Value::Ref(n) if n == "CC"));
        assert!(matches!(&parts[1], Value::Str(s) if s == " -c "));
        assert!(matches!(&parts[2], Value::Ref(n) if n == "<"));
        assert!(matches!(&parts[4], Value::Ref(n) if n == "@"));
    }

    #[test]
    fn double_dollar_is_literal() {
        assert!(matches!(parse_text("echo $$HOME"), Value::Str(s) if s == "echo $HOME"));
    }

    #[test]
    fn invoke_carries_target_and_args() {
        let v = parse_text("$(=> gen a=1 -v)");
        let Value::Invoke { target, args } = v else {
            panic!("expected invoke");
        };
        assert_eq!(target.strval(), "gen");
        assert!(matches!(&args[0], Value::Pair(..)));
        assert!(matches!(&args[1], Value::Flag(f) if f == "v"));
    }

    #[test]
    fn args_distinguish_flags_and_pairs() {
        assert!(matches!(parse_arg("-or"), Value::Flag(f) if f == "or"));
        assert_eq!(parse_arg("status=0").strval(), "status=0");
        assert!(matches!(parse_arg("-reason=why not"), Value::Pair(k, _) if matches!(*k, Value::Flag(_))));
        assert!(matches!(parse_arg("%.c"), Value::Str(_)));
    }

    #[test]
    fn double_equals_stays_a_comparison() {
        assert!(matches!(parse_arg("debug==debug"), Value::Str(s) if s == "debug==debug"));
        assert!(matches!(parse_arg("a=="), Value::Str(_)));
        assert!(matches!(parse_arg("-reason==x"), Value::Str(_)));
    }

    #[test]
    fn unbalanced_reference_is_kept_verbatim() {
        assert_eq!(parse_text("a $(b").strval(), "a $(b");
    }
}
