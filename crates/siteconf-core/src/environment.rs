//! Environment identifiers
//!
//! An environment names a deployment target (`local`, `production`,
//! `pages`, ...) and selects which overlay is applied to the base
//! configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// Environment variable consulted by [`EnvironmentId::from_env`]
pub const SITE_ENV: &str = "SITE_ENV";

/// Environment used when `SITE_ENV` is unset
pub const DEFAULT_ENVIRONMENT: &str = "local";

/// Reserved name that always resolves to the base configuration alone
pub const BASE: &str = "base";

/// Reasons an environment name is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentIdError {
    #[error("environment name is empty")]
    Empty,
    #[error("invalid environment name '{0}': use lowercase letters, digits, '-' or '_'")]
    InvalidCharacters(String),
}

/// Validated name of a deployment environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvironmentId(String);

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid regex"))
}

impl EnvironmentId {
    /// Parse and validate an environment name
    pub fn new(name: impl Into<String>) -> Result<Self, EnvironmentIdError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(EnvironmentIdError::Empty);
        }
        if !name_pattern().is_match(trimmed) {
            return Err(EnvironmentIdError::InvalidCharacters(name));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The base pseudo-environment
    pub fn base() -> Self {
        Self(BASE.to_string())
    }

    /// Read the active environment from `SITE_ENV`, defaulting to `local`
    pub fn from_env() -> Result<Self, EnvironmentIdError> {
        match std::env::var(SITE_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::new(value),
            _ => Ok(Self(DEFAULT_ENVIRONMENT.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the base pseudo-environment
    pub fn is_base(&self) -> bool {
        self.0 == BASE
    }
}

impl FromStr for EnvironmentId {
    type Err = EnvironmentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EnvironmentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
