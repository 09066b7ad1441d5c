//! Environment variable interpolation in string values
//!
//! Supported forms:
//! - `${env:VAR}` - value of `VAR`, error if unset
//! - `${env:VAR,default=text}` - value of `VAR`, or `text` if unset
//! - `\${escaped}` - literal `${escaped}`
//!
//! Literal text around expressions is kept, so `https://${env:HOST}` works.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// A lookup for variables referenced by `${env:...}`
pub trait VariableSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads variables from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VariableSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl VariableSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// A parsed piece of a string value
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Text copied through unchanged
    Literal(String),
    /// An `${env:...}` reference
    Env {
        name: String,
        default: Option<String>,
    },
}

/// Check if a string contains anything to expand or unescape
pub fn needs_processing(s: &str) -> bool {
    s.contains("${")
}

/// Parse a string into literal and variable segments
pub fn parse(input: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("\\${") {
            literal.push_str("${");
            rest = after;
        } else if let Some(after) = rest.strip_prefix("${") {
            let end = after.find('}').ok_or_else(|| {
                Error::parse(format!("Unterminated interpolation in '{}'", input))
            })?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(parse_expression(&after[..end])?);
            rest = &after[end + 1..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                literal.push(c);
            }
            rest = chars.as_str();
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

fn parse_expression(expr: &str) -> Result<Segment> {
    let body = expr.trim().strip_prefix("env:").ok_or_else(|| {
        Error::parse(format!(
            "Unsupported interpolation '${{{}}}': only ${{env:VAR}} is available",
            expr
        ))
    })?;

    let (name, default) = match body.split_once(',') {
        Some((name, arg)) => {
            let default = arg.trim().strip_prefix("default=").ok_or_else(|| {
                Error::parse(format!(
                    "Unexpected argument '{}' in '${{{}}}', expected default=...",
                    arg.trim(),
                    expr
                ))
            })?;
            (name.trim(), Some(default.to_string()))
        }
        None => (body.trim(), None),
    };

    if name.is_empty() {
        return Err(Error::parse(format!(
            "Missing variable name in '${{{}}}'",
            expr
        )));
    }

    Ok(Segment::Env {
        name: name.to_string(),
        default,
    })
}

/// Expand a single string, reporting errors against `path`
pub fn expand_str(input: &str, vars: &dyn VariableSource, path: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    for segment in parse(input).map_err(|e| e.with_path(path))? {
        match segment {
            Segment::Literal(s) => out.push_str(&s),
            Segment::Env { name, default } => match vars.var(&name).or(default) {
                Some(v) => out.push_str(&v),
                None => return Err(Error::env_not_found(name, Some(path.to_string()))),
            },
        }
    }
    Ok(out)
}

/// Expand every string in a value tree in place
pub fn expand(value: &mut Value, vars: &dyn VariableSource) -> Result<()> {
    expand_at(value, vars, "")
}

fn expand_at(value: &mut Value, vars: &dyn VariableSource, path: &str) -> Result<()> {
    match value {
        Value::String(s) if needs_processing(s) => {
            *s = expand_str(s, vars, path)?;
        }
        Value::Sequence(seq) => {
            for (i, item) in seq.iter_mut().enumerate() {
                expand_at(item, vars, &format!("{}[{}]", path, i))?;
            }
        }
        Value::Mapping(map) => {
            for (key, item) in map.iter_mut() {
                let key_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                expand_at(item, vars, &key_path)?;
            }
        }
        _ => {}
    }
    Ok(())
}
