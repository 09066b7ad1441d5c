//! Configuration value tree
//!
//! Sources are parsed into an order-preserving tree of scalars,
//! sequences and mappings. Overlays are merged into the base at this level,
//! before the result is checked against the schema and typed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Maps a config path (e.g. "author.name") to the layer that provided it
pub type SourceMap = IndexMap<String, String>;

/// A configuration value as read from a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value (may contain `${env:VAR}` interpolations)
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(IndexMap<String, Value>),
}

impl Value {
    /// An empty mapping
    pub fn empty_mapping() -> Self {
        Value::Mapping(IndexMap::new())
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as slice if this is a Sequence
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Get a value by path (e.g., "author.name" or "menu[0].path")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }

        let segments = parse_path(path).ok()?;
        let mut current = self;

        for segment in &segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => map.get(key.as_str())?,
                (PathSegment::Index(idx), Value::Sequence(seq)) => seq.get(*idx)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Merge an overlay into this value
    ///
    /// Merge semantics:
    /// - Mappings: merged key by key, unless the policy replaces the path
    /// - Scalars: `other` wins
    /// - Sequences: `other` replaces entirely
    /// - Null in other: removes the key
    /// - Type mismatch: `other` wins
    pub fn merge(&mut self, other: Value, policy: &MergePolicy) {
        self.merge_at(other, policy, "", "", None);
    }

    /// Merge an overlay, recording `layer` as the source of every path it sets
    pub fn merge_tracking_sources(
        &mut self,
        other: Value,
        policy: &MergePolicy,
        layer: &str,
        sources: &mut SourceMap,
    ) {
        self.merge_at(other, policy, "", layer, Some(sources));
    }

    fn merge_at(
        &mut self,
        other: Value,
        policy: &MergePolicy,
        path: &str,
        layer: &str,
        mut sources: Option<&mut SourceMap>,
    ) {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) if !policy.replaces(path) => {
                for (key, overlay_value) in overlay {
                    let key_path = join_key(path, &key);
                    if overlay_value.is_null() {
                        base.shift_remove(&key);
                        if let Some(map) = sources.as_deref_mut() {
                            forget_prefix(map, &key_path);
                        }
                    } else if let Some(base_value) = base.get_mut(&key) {
                        base_value.merge_at(
                            overlay_value,
                            policy,
                            &key_path,
                            layer,
                            sources.as_deref_mut(),
                        );
                    } else {
                        if let Some(map) = sources.as_deref_mut() {
                            overlay_value.collect_leaf_paths(&key_path, policy, layer, map);
                        }
                        base.insert(key, overlay_value);
                    }
                }
            }
            (this, other) => {
                if let Some(map) = sources {
                    forget_prefix(map, path);
                    other.collect_leaf_paths(path, policy, layer, map);
                }
                *this = other;
            }
        }
    }

    /// Record `layer` as the source of every leaf under `prefix`
    ///
    /// Sequences and paths the policy replaces wholesale count as leaves.
    pub fn collect_leaf_paths(
        &self,
        prefix: &str,
        policy: &MergePolicy,
        layer: &str,
        sources: &mut SourceMap,
    ) {
        match self {
            Value::Mapping(map) if !policy.replaces(prefix) => {
                for (key, value) in map {
                    value.collect_leaf_paths(&join_key(prefix, key), policy, layer, sources);
                }
            }
            _ if prefix.is_empty() => {}
            _ => {
                sources.insert(prefix.to_string(), layer.to_string());
            }
        }
    }
}

/// Controls which paths an overlay replaces wholesale instead of merging
#[derive(Debug, Clone, Default)]
pub struct MergePolicy {
    replace: Vec<String>,
}

impl MergePolicy {
    /// Merge every mapping key by key
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the value at `path` wholesale when an overlay sets it
    pub fn replace_at(mut self, path: impl Into<String>) -> Self {
        self.replace.push(path.into());
        self
    }

    /// Policy for site configuration: the top level and `author` merge
    /// field by field, `menu` and `author.contacts` are replaced as a unit.
    pub fn site() -> Self {
        Self::new().replace_at("menu").replace_at("author.contacts")
    }

    pub fn replaces(&self, path: &str) -> bool {
        self.replace.iter().any(|p| p == path)
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn forget_prefix(sources: &mut SourceMap, prefix: &str) {
    if prefix.is_empty() {
        sources.clear();
        return;
    }
    sources.retain(|path, _| {
        !(path == prefix
            || path.starts_with(&format!("{}.", prefix))
            || path.starts_with(&format!("{}[", prefix)))
    });
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}

/// A segment in a path expression
#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    /// A key in a mapping (e.g., "author" in "author.name")
    Key(String),
    /// An index in a sequence (e.g., 0 in "menu[0]")
    Index(usize),
}

/// Parse a path string into segments
/// Supports: "key", "key.subkey", "key[0]", "key[0].subkey"
fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut current_key = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
            }
            '[' => {
                if !current_key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current_key)));
                }
                let index_str: String = chars.by_ref().take_while(|c| *c != ']').collect();
                let idx: usize = index_str.parse().map_err(|_| {
                    Error::parse(format!("Invalid array index in path: {}", index_str))
                })?;
                segments.push(PathSegment::Index(idx));
            }
            ']' => {
                return Err(Error::parse("Unexpected ']' in path"));
            }
            _ => {
                current_key.push(c);
            }
        }
    }

    if !current_key.is_empty() {
        segments.push(PathSegment::Key(current_key));
    }

    Ok(segments)
}
