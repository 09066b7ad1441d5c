//! Configuration sources
//!
//! A [`ConfigSources`] holds the base configuration and one partial overlay
//! per environment. Sources come from either:
//!
//! - a single document with a `base` mapping and an optional
//!   `environments` mapping of overlays, or
//! - a directory holding `site.yaml` (the base) and `site.<env>.yaml`
//!   files (the overlays). `.yml` and `.json` work as well.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::environment::EnvironmentId;
use crate::error::{Error, Result};
use crate::value::Value;

/// File stem of the base configuration in a directory source
pub const BASE_FILE_STEM: &str = "site";

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Base configuration plus overlays keyed by environment
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSources {
    base: Value,
    overlays: IndexMap<EnvironmentId, Value>,
}

/// Single-document layout
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    base: Value,
    #[serde(default)]
    environments: IndexMap<String, Value>,
}

impl ConfigSources {
    /// Create sources with a base and no overlays
    pub fn new(base: Value) -> Result<Self> {
        Ok(Self {
            base: expect_mapping(base, "base")?,
            overlays: IndexMap::new(),
        })
    }

    /// Add the overlay for an environment, replacing any earlier one
    pub fn with_overlay(mut self, environment: EnvironmentId, overlay: Value) -> Result<Self> {
        if environment.is_base() {
            return Err(Error::parse(format!(
                "'{}' is reserved for the base configuration",
                environment
            )));
        }
        let overlay = expect_mapping(overlay, environment.as_str())?;
        self.overlays.insert(environment, overlay);
        Ok(self)
    }

    /// Load from a single YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let doc: Document = serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_document(doc)
    }

    /// Load from a single JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Document = serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_document(doc)
    }

    fn from_document(doc: Document) -> Result<Self> {
        let mut sources = Self::new(doc.base)?;
        for (name, overlay) in doc.environments {
            let env = EnvironmentId::new(name).map_err(|e| Error::parse(e.to_string()))?;
            sources = sources.with_overlay(env, overlay)?;
        }
        Ok(sources)
    }

    /// Load a single-document source file (JSON or YAML based on extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_file(path)?;
        log::debug!("Loading site configuration from `{}`", path.display());

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        };
        parsed.map_err(|e| e.with_file(path.display().to_string()))
    }

    /// Load `site.yaml` and its `site.<env>.yaml` overlays from a directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let base_path = EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", BASE_FILE_STEM, ext)))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                let expected = dir.join(format!("{}.yaml", BASE_FILE_STEM));
                Error::base_not_found(expected.display().to_string())
            })?;

        log::debug!("Using base configuration `{}`", base_path.display());
        let mut sources = Self::new(read_value(&base_path)?)
            .map_err(|e| e.with_file(base_path.display().to_string()))?;

        let entries =
            fs::read_dir(dir).map_err(|e| Error::io(dir.display().to_string(), e.to_string()))?;
        let mut overlay_files: Vec<(EnvironmentId, PathBuf)> = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| Error::io(dir.display().to_string(), e.to_string()))?
                .path();
            let Some(env) = overlay_environment(&path)? else {
                continue;
            };
            if overlay_files.iter().any(|(seen, _)| *seen == env) {
                return Err(Error::parse(format!(
                    "More than one overlay file for environment '{}'",
                    env
                ))
                .with_file(path.display().to_string())
                .with_help(format!(
                    "Keep only one of {}.{}.{{yaml,yml,json}}",
                    BASE_FILE_STEM, env
                )));
            }
            overlay_files.push((env, path));
        }
        overlay_files.sort_by(|a, b| a.0.cmp(&b.0));

        for (env, path) in overlay_files {
            log::debug!("Using overlay `{}` for environment `{}`", path.display(), env);
            sources = sources
                .with_overlay(env, read_value(&path)?)
                .map_err(|e| e.with_file(path.display().to_string()))?;
        }

        Ok(sources)
    }

    /// Load from a directory or a single-document file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::from_file(path)
        }
    }

    pub fn base(&self) -> &Value {
        &self.base
    }

    /// The overlay for an environment, if one was declared
    pub fn overlay(&self, environment: &EnvironmentId) -> Option<&Value> {
        self.overlays.get(environment)
    }

    /// Environments with an overlay, in declaration order
    pub fn environments(&self) -> impl Iterator<Item = &EnvironmentId> {
        self.overlays.keys()
    }
}

/// A null source (empty file, `production: ~`) counts as an empty mapping
fn expect_mapping(value: Value, layer: &str) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::empty_mapping()),
        Value::Mapping(_) => Ok(value),
        other => Err(Error::parse(format!(
            "Configuration layer '{}' must be a mapping, got {}",
            layer,
            other.type_name()
        ))),
    }
}

/// `site.production.yaml` -> `production`; anything else -> `None`
fn overlay_environment(path: &Path) -> Result<Option<EnvironmentId>> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let mut parts = name.splitn(3, '.');
    let (Some(stem), Some(env), Some(ext)) = (parts.next(), parts.next(), parts.next()) else {
        return Ok(None);
    };
    if stem != BASE_FILE_STEM || !EXTENSIONS.contains(&ext) || !path.is_file() {
        return Ok(None);
    }
    EnvironmentId::new(env)
        .map(Some)
        .map_err(|e| Error::parse(e.to_string()).with_file(path.display().to_string()))
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        IoErrorKind::NotFound => Error::base_not_found(path.display().to_string()),
        _ => Error::io(path.display().to_string(), e.to_string()),
    })
}

fn read_value(path: &Path) -> Result<Value> {
    let content = read_file(path)?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| Error::parse(e.to_string())),
        _ if content.trim().is_empty() => Ok(Value::Null),
        _ => serde_yaml::from_str(&content).map_err(|e| Error::parse(e.to_string())),
    };
    parsed.map_err(|e| e.with_file(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn env(name: &str) -> EnvironmentId {
        EnvironmentId::new(name).unwrap()
    }

    #[test]
    fn test_from_yaml_document() {
        let sources = ConfigSources::from_yaml(
            r#"
base:
  title: Blog
environments:
  production:
    url: https://derekworthen.com
  pages:
    url: https://dworthen.github.io
"#,
        )
        .unwrap();

        assert_eq!(
            sources.base().get_path("title").and_then(Value::as_str),
            Some("Blog")
        );
        let envs: Vec<_> = sources.environments().map(EnvironmentId::as_str).collect();
        assert_eq!(envs, vec!["production", "pages"]);
        assert!(sources.overlay(&env("local")).is_none());
    }

    #[test]
    fn test_null_overlay_is_empty() {
        let sources =
            ConfigSources::from_yaml("base:\n  title: Blog\nenvironments:\n  local: ~\n").unwrap();
        assert_eq!(sources.overlay(&env("local")), Some(&Value::empty_mapping()));
    }

    #[test]
    fn test_document_requires_base() {
        assert!(ConfigSources::from_yaml("environments: {}").is_err());
    }

    #[test]
    fn test_document_rejects_unknown_keys() {
        assert!(ConfigSources::from_yaml("base: {}\nprofiles: {}").is_err());
    }

    #[test]
    fn test_overlay_must_be_mapping() {
        let err = ConfigSources::from_yaml("base: {}\nenvironments:\n  pages: [1, 2]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.to_string().contains("'pages' must be a mapping"));
    }

    #[test]
    fn test_invalid_environment_name() {
        assert!(ConfigSources::from_yaml("base: {}\nenvironments:\n  Prod: {}").is_err());
        assert!(ConfigSources::from_yaml("base: {}\nenvironments:\n  base: {}").is_err());
    }

    #[test]
    fn test_from_json_document() {
        let sources = ConfigSources::from_json(
            r#"{"base": {"title": "Blog"}, "environments": {"production": {"postsPerPage": 8}}}"#,
        )
        .unwrap();
        assert_eq!(
            sources
                .overlay(&env("production"))
                .and_then(|o| o.get_path("postsPerPage"))
                .and_then(Value::as_i64),
            Some(8)
        );
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("site.yaml"), "title: Blog\n").unwrap();
        fs::write(
            dir.path().join("site.production.yaml"),
            "url: https://derekworthen.com\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("site.pages.json"),
            r#"{"url": "https://dworthen.github.io"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("site.local.yml"), "").unwrap();
        fs::write(dir.path().join("README.md"), "not config").unwrap();
        fs::write(dir.path().join("site.production.yaml.bak"), "junk: [").unwrap();

        let sources = ConfigSources::from_dir(dir.path()).unwrap();

        let envs: Vec<_> = sources.environments().map(EnvironmentId::as_str).collect();
        assert_eq!(envs, vec!["local", "pages", "production"]);
        assert_eq!(
            sources
                .overlay(&env("pages"))
                .and_then(|o| o.get_path("url"))
                .and_then(Value::as_str),
            Some("https://dworthen.github.io")
        );
        assert_eq!(sources.overlay(&env("local")), Some(&Value::empty_mapping()));
    }

    #[test]
    fn test_from_dir_duplicate_overlay() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("site.yaml"), "title: Blog\n").unwrap();
        fs::write(dir.path().join("site.pages.yaml"), "{}").unwrap();
        fs::write(dir.path().join("site.pages.yml"), "{}").unwrap();

        let err = ConfigSources::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("More than one overlay file"));
        assert_eq!(
            err.help.as_deref(),
            Some("Keep only one of site.pages.{yaml,yml,json}")
        );
    }

    #[test]
    fn test_from_dir_missing_base() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigSources::from_dir(dir.path()).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::SourceNotFound {
                environment: "base".into()
            }
        );
    }

    #[test]
    fn test_from_file_missing() {
        let err = ConfigSources::from_file("tests/fixtures/does_not_exist.yaml").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::SourceNotFound { .. }));
        assert!(err.file.is_some());
    }

    #[test]
    fn test_from_file_invalid_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.yaml");
        fs::write(&path, "base: [unclosed").unwrap();

        let err = ConfigSources::from_file(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(err.file, Some(path.display().to_string()));
    }

    #[test]
    fn test_load_dispatches_on_path_kind() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("site.yaml"), "title: Blog\n").unwrap();
        let from_dir = ConfigSources::load(dir.path()).unwrap();
        assert_eq!(from_dir.environments().count(), 0);

        let doc = dir.path().join("blog.yaml");
        fs::write(&doc, "base:\n  title: Blog\nenvironments:\n  pages: {}\n").unwrap();
        let from_file = ConfigSources::load(&doc).unwrap();
        assert_eq!(from_file.environments().count(), 1);
    }
}
