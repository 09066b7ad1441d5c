//! Schema validation for site configuration
//!
//! Validation runs in two phases over the merged value tree:
//! - Phase 1 (structural): JSON Schema checks for required fields, types,
//!   constraints and unknown keys
//! - Phase 2 (semantic): checks JSON Schema cannot express, such as URL
//!   parsing and duplicate menu paths

use std::collections::HashSet;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;

use crate::error::{Error, Result};
use crate::value::Value;

/// The schema every resolved site configuration must satisfy
pub const SITE_SCHEMA: &str = r#"
$schema: "https://json-schema.org/draft/2020-12/schema"
title: SiteConfig
type: object
required: [url, title, subtitle, copyright, author]
additionalProperties: false
properties:
  url:
    type: string
    minLength: 1
  title:
    type: string
    minLength: 1
  subtitle:
    type: string
    minLength: 1
  copyright:
    type: string
    minLength: 1
  disqusShortname:
    type: [string, "null"]
  postsPerPage:
    type: integer
    minimum: 1
    maximum: 4294967295
  googleAnalyticsId:
    type: [string, "null"]
    pattern: "^(UA-[0-9]{4,10}-[0-9]{1,4}|G-[A-Z0-9]{4,12})?$"
  menu:
    type: array
    items:
      type: object
      required: [label, path]
      additionalProperties: false
      properties:
        label:
          type: string
          minLength: 1
        path:
          type: string
          pattern: "^/"
  author:
    type: object
    required: [name, photo, bio]
    additionalProperties: false
    properties:
      name:
        type: string
        minLength: 1
      photo:
        type: string
        minLength: 1
      bio:
        type: string
      contacts:
        type: [object, "null"]
        additionalProperties: false
        properties:
          twitter: { type: [string, "null"] }
          github: { type: [string, "null"] }
          rss: { type: [string, "null"] }
          facebook: { type: [string, "null"] }
          instagram: { type: [string, "null"] }
          email: { type: [string, "null"] }
          telegram: { type: [string, "null"] }
          vkontakte: { type: [string, "null"] }
"#;

/// Schema for validating configuration
#[derive(Debug, Clone)]
pub struct Schema {
    /// The JSON Schema as a serde_json::Value
    schema: serde_json::Value,
    /// Compiled JSON Schema validator (wrapped in Arc for Clone)
    compiled: Arc<jsonschema::Validator>,
}

impl Schema {
    /// The built-in site configuration schema
    pub fn site() -> Result<Self> {
        Self::from_yaml(SITE_SCHEMA)
    }

    /// Load a schema from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::parse(format!("Invalid JSON schema: {}", e)))?;
        Self::from_value(schema)
    }

    /// Load a schema from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let schema: serde_json::Value = serde_yaml::from_str(yaml)
            .map_err(|e| Error::parse(format!("Invalid YAML schema: {}", e)))?;
        Self::from_value(schema)
    }

    fn from_value(schema: serde_json::Value) -> Result<Self> {
        let compiled = jsonschema::validator_for(&schema)
            .map_err(|e| Error::parse(format!("Invalid JSON Schema: {}", e)))?;
        Ok(Self {
            schema,
            compiled: Arc::new(compiled),
        })
    }

    /// Validate a Value against this schema
    ///
    /// Returns the first structural failure, or the first semantic one if
    /// the structure is sound.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let json_value = value_to_json(value);

        if let Some(error) = self.compiled.iter_errors(&json_value).next() {
            return Err(convert_error(&error));
        }

        match check_semantics(value).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Validate and collect all errors (instead of failing on first)
    pub fn validate_collect(&self, value: &Value) -> Vec<Error> {
        let json_value = value_to_json(value);

        let mut errors: Vec<Error> = self
            .compiled
            .iter_errors(&json_value)
            .map(|e| convert_error(&e))
            .collect();
        errors.extend(check_semantics(value));
        errors
    }

    /// Get the raw schema value
    pub fn as_value(&self) -> &serde_json::Value {
        &self.schema
    }
}

fn convert_error(error: &jsonschema::ValidationError<'_>) -> Error {
    let path = pointer_to_path(&error.instance_path.to_string());
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let field = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            Error::missing_field(join(&path, &field))
        }
        ValidationErrorKind::AdditionalProperties { unexpected } if path == "author.contacts" => {
            let channel = unexpected.first().cloned().unwrap_or_default();
            Error::unknown_contact_channel(join(&path, &channel), channel)
        }
        _ => Error::invalid_value(
            if path.is_empty() { "<root>" } else { &path },
            error.to_string(),
        ),
    }
}

/// Checks that need more than JSON Schema. Shapes the structural phase
/// rejects are skipped here rather than reported twice.
fn check_semantics(value: &Value) -> Vec<Error> {
    let mut errors = Vec::new();

    if let Some(raw) = value.get_path("url").and_then(Value::as_str) {
        if let Err(message) = check_url(raw) {
            errors.push(Error::invalid_url("url", raw, message));
        }
    }

    // JSON Schema treats 4.0 as an integer
    if let Some(Value::Float(n)) = value.get_path("postsPerPage") {
        errors.push(Error::invalid_value(
            "postsPerPage",
            format!("{} is not a whole number", n),
        ));
    }

    if let Some(menu) = value.get_path("menu").and_then(Value::as_sequence) {
        let mut seen = HashSet::new();
        for (i, item) in menu.iter().enumerate() {
            if let Some(path) = item.get_path("path").and_then(Value::as_str) {
                if !seen.insert(path) {
                    errors.push(Error::duplicate_menu_path(format!("menu[{}].path", i), path));
                }
            }
        }
    }

    errors
}

fn check_url(raw: &str) -> std::result::Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", parsed.scheme()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err("missing host".into());
    }
    Ok(())
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Convert a JSON pointer ("/menu/1/path") to a config path ("menu[1].path")
fn pointer_to_path(pointer: &str) -> String {
    let mut path = String::new();
    for token in pointer.split('/').skip(1) {
        let token = token.replace("~1", "/").replace("~0", "~");
        if token.parse::<usize>().is_ok() {
            path.push_str(&format!("[{}]", token));
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(&token);
        }
    }
    path
}

/// Convert a siteconf Value to serde_json::Value
pub(crate) fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(seq) => serde_json::Value::Array(seq.iter().map(value_to_json).collect()),
        Value::Mapping(map) => {
            let obj: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect();
            serde_json::Value::Object(obj)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SchemaErrorKind};

    const VALID: &str = r##"
url: http://localhost:8000
title: Blog by Derek Worthen
subtitle: ASP.NET Core, Blazor and TypeScript.
copyright: © All rights reserved.
disqusShortname: ""
postsPerPage: 4
googleAnalyticsId: UA-116962643-1
menu:
  - label: Articles
    path: /
  - label: Tags
    path: /tags
author:
  name: Derek Worthen
  photo: /photo.jpg
  bio: ASP.NET Core, Blazor and TypeScript.
  contacts:
    twitter: "#"
    github: dworthen
    rss: rss.xml
"##;

    fn config(overrides: &str) -> Value {
        let mut value: Value = serde_yaml::from_str(VALID).unwrap();
        let overlay: Value = serde_yaml::from_str(overrides).unwrap();
        value.merge(overlay, &crate::value::MergePolicy::site());
        value
    }

    fn first_error(overrides: &str) -> Error {
        Schema::site().unwrap().validate(&config(overrides)).unwrap_err()
    }

    #[test]
    fn test_site_schema_compiles() {
        let schema = Schema::site().unwrap();
        assert!(schema.as_value().is_object());
    }

    #[test]
    fn test_valid_config() {
        assert!(Schema::site().unwrap().validate(&config("{}")).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let err = first_error("title: ~");
        assert_eq!(err.kind, ErrorKind::Schema(SchemaErrorKind::MissingField));
        assert_eq!(err.path.as_deref(), Some("title"));
    }

    #[test]
    fn test_missing_nested_field() {
        let err = first_error("author:\n  photo: ~");
        assert_eq!(err.kind, ErrorKind::Schema(SchemaErrorKind::MissingField));
        assert_eq!(err.path.as_deref(), Some("author.photo"));
    }

    #[test]
    fn test_empty_title_rejected() {
        let err = first_error("title: ''");
        assert_eq!(err.kind, ErrorKind::Schema(SchemaErrorKind::InvalidValue));
        assert_eq!(err.path.as_deref(), Some("title"));
    }

    #[test]
    fn test_posts_per_page_must_be_positive() {
        for bad in ["postsPerPage: 0", "postsPerPage: -3"] {
            let err = first_error(bad);
            assert_eq!(err.path.as_deref(), Some("postsPerPage"));
        }
        assert!(Schema::site()
            .unwrap()
            .validate(&config("postsPerPage: 4"))
            .is_ok());
    }

    #[test]
    fn test_posts_per_page_wrong_type() {
        let err = first_error("postsPerPage: four");
        assert!(err.is_schema());
    }

    #[test]
    fn test_posts_per_page_must_fit_typed_field() {
        for bad in ["postsPerPage: 4.0", "postsPerPage: 5000000000"] {
            let err = first_error(bad);
            assert_eq!(
                err.kind,
                ErrorKind::Schema(SchemaErrorKind::InvalidValue),
                "{}",
                bad
            );
            assert_eq!(err.path.as_deref(), Some("postsPerPage"), "{}", bad);
        }
        assert!(Schema::site()
            .unwrap()
            .validate(&config("postsPerPage: 4294967295"))
            .is_ok());
    }

    #[test]
    fn test_malformed_url() {
        for bad in ["url: localhost:8000/blog", "url: not a url", "url: 'ftp://x.org'"] {
            let err = first_error(bad);
            assert_eq!(
                err.kind,
                ErrorKind::Schema(SchemaErrorKind::InvalidUrl),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_duplicate_menu_paths() {
        let err = first_error(
            "menu:\n  - {label: Articles, path: /}\n  - {label: Home, path: /}",
        );
        assert_eq!(
            err.kind,
            ErrorKind::Schema(SchemaErrorKind::DuplicateMenuPath {
                menu_path: "/".into()
            })
        );
        assert_eq!(err.path.as_deref(), Some("menu[1].path"));
    }

    #[test]
    fn test_menu_path_must_start_with_slash() {
        let err = first_error("menu:\n  - {label: Tags, path: tags}");
        assert_eq!(err.path.as_deref(), Some("menu[0].path"));
    }

    #[test]
    fn test_unknown_contact_channel() {
        let err = first_error("author:\n  contacts:\n    myspace: tom");
        assert_eq!(
            err.kind,
            ErrorKind::Schema(SchemaErrorKind::UnknownContactChannel {
                channel: "myspace".into()
            })
        );
        assert_eq!(err.path.as_deref(), Some("author.contacts.myspace"));
    }

    #[test]
    fn test_empty_contact_is_valid() {
        assert!(Schema::site()
            .unwrap()
            .validate(&config("author:\n  contacts:\n    email: ''\n    github: dworthen"))
            .is_ok());
    }

    #[test]
    fn test_analytics_id_pattern() {
        let schema = Schema::site().unwrap();
        for ok in [
            "googleAnalyticsId: UA-73379983-2",
            "googleAnalyticsId: G-ABC123XYZ",
            "googleAnalyticsId: ''",
            "googleAnalyticsId: ~",
        ] {
            assert!(schema.validate(&config(ok)).is_ok(), "{}", ok);
        }
        assert!(schema
            .validate(&config("googleAnalyticsId: analytics"))
            .is_err());
    }

    #[test]
    fn test_unknown_top_level_field() {
        let err = first_error("theme: dark");
        assert!(err.is_schema());
    }

    #[test]
    fn test_validate_collect_reports_everything() {
        let errors = Schema::site().unwrap().validate_collect(&config(
            "title: ~\nmenu:\n  - {label: A, path: /a}\n  - {label: B, path: /a}",
        ));
        assert!(errors.len() >= 2);
        assert!(errors
            .iter()
            .any(|e| e.kind == ErrorKind::Schema(SchemaErrorKind::MissingField)));
        assert!(errors.iter().any(|e| matches!(
            e.kind,
            ErrorKind::Schema(SchemaErrorKind::DuplicateMenuPath { .. })
        )));
    }

    #[test]
    fn test_pointer_to_path() {
        assert_eq!(pointer_to_path(""), "");
        assert_eq!(pointer_to_path("/url"), "url");
        assert_eq!(pointer_to_path("/menu/1/path"), "menu[1].path");
        assert_eq!(pointer_to_path("/author/contacts"), "author.contacts");
    }
}
