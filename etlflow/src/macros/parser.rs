//! Placeholder scanning and substitution.

use super::MacroEvaluator;
use crate::errors::MacroFailure;

/// How many times a substituted value may itself be expanded.
pub const MAX_SUBSTITUTION_DEPTH: usize = 10;

const ESCAPABLE: [char; 7] = ['$', '{', '}', '(', ')', ',', '\\'];

fn is_escapable(c: char) -> bool {
    ESCAPABLE.contains(&c)
}

/// Substitutes every placeholder in `input`.
///
/// # Errors
///
/// Returns the first failure reported by the evaluator, or a malformed or
/// recursion failure from the parser.
pub fn substitute(input: &str, evaluator: &dyn MacroEvaluator) -> Result<String, MacroFailure> {
    let expanded = expand(input, evaluator, 0)?;
    Ok(unescape(&expanded))
}

/// Returns the outermost placeholder bodies of `input`, in order.
///
/// # Errors
///
/// Returns `MacroFailure::Malformed` for an unterminated placeholder.
pub fn placeholders(input: &str) -> Result<Vec<String>, MacroFailure> {
    let chars: Vec<char> = input.chars().collect();
    let mut found = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1).copied().is_some_and(is_escapable) {
            i += 2;
        } else if opens_macro(&chars, i) {
            let end = find_close(&chars, i)?;
            found.push(chars[i + 2..end].iter().collect());
            i = end + 1;
        } else {
            i += 1;
        }
    }
    Ok(found)
}

fn opens_macro(chars: &[char], i: usize) -> bool {
    chars[i] == '$' && chars.get(i + 1) == Some(&'{')
}

/// Expands placeholders, keeping escape sequences intact so that nested
/// expansion passes see the same escapes as the top level.
fn expand(
    input: &str,
    evaluator: &dyn MacroEvaluator,
    depth: usize,
) -> Result<String, MacroFailure> {
    if depth > MAX_SUBSTITUTION_DEPTH {
        return Err(MacroFailure::RecursionLimit(MAX_SUBSTITUTION_DEPTH));
    }

    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1).copied().is_some_and(is_escapable) {
            out.push('\\');
            out.push(chars[i + 1]);
            i += 2;
        } else if opens_macro(&chars, i) {
            let end = find_close(&chars, i)?;
            let body: String = chars[i + 2..end].iter().collect();
            let value = evaluate_body(&body, evaluator, depth)?;
            out.push_str(&expand(&value, evaluator, depth + 1)?);
            i = end + 1;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Finds the `}` closing the placeholder opened at `open`.
fn find_close(chars: &[char], open: usize) -> Result<usize, MacroFailure> {
    let mut depth = 0usize;
    let mut i = open;
    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1).copied().is_some_and(is_escapable) {
            i += 2;
            continue;
        }
        if opens_macro(chars, i) {
            depth += 1;
            i += 2;
            continue;
        }
        if chars[i] == '}' {
            depth -= 1;
            if depth == 0 {
                return Ok(i);
            }
        }
        i += 1;
    }
    let text: String = chars[open..].iter().collect();
    Err(MacroFailure::Malformed(format!("unterminated placeholder '{text}'")))
}

/// Evaluates one placeholder body.
///
/// Call arguments are split on the raw text before each one is expanded, so
/// a nested value containing `,` stays a single argument.
fn evaluate_body(
    raw: &str,
    evaluator: &dyn MacroEvaluator,
    depth: usize,
) -> Result<String, MacroFailure> {
    if raw.is_empty() {
        return Err(MacroFailure::Malformed("empty placeholder '${}'".to_string()));
    }

    if let Some((name, args)) = split_call(raw) {
        let args = split_arguments(args)
            .into_iter()
            .map(|arg| expand(arg, evaluator, depth).map(|value| unescape(value.trim())))
            .collect::<Result<Vec<_>, _>>()?;
        return evaluator.evaluate(name, &args);
    }

    let body = expand(raw, evaluator, depth)?;
    if body.is_empty() {
        return Err(MacroFailure::Malformed(format!(
            "placeholder '${{{raw}}}' expanded to nothing"
        )));
    }
    if let Some((name, args)) = split_call(&body) {
        let args: Vec<String> = split_arguments(args)
            .into_iter()
            .map(|arg| unescape(arg.trim()))
            .collect();
        return evaluator.evaluate(name, &args);
    }
    evaluator.lookup(&unescape(&body))
}

/// Splits `name(args)` into its parts when `body` is a function call.
fn split_call(body: &str) -> Option<(&str, &str)> {
    let open = find_unescaped(body, '(')?;
    let name = &body[..open];
    let is_identifier = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !is_identifier || !body.ends_with(')') || body.ends_with("\\)") {
        return None;
    }
    Some((name, &body[open + 1..body.len() - 1]))
}

fn find_unescaped(text: &str, target: char) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == target {
            return Some(idx);
        }
    }
    None
}

/// Splits call arguments on top-level `,`, skipping escapes and nested
/// placeholders.
fn split_arguments(text: &str) -> Vec<&str> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '$' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                chars.next();
                depth += 1;
            }
            '}' if depth > 0 => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if is_escapable(next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
