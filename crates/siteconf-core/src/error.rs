//! Error types for siteconf
//!
//! Errors are structured: a kind, the config path and environment where the
//! problem was found, the underlying cause, and an actionable help message.

use std::fmt;

/// Result type alias for siteconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for siteconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path in the config where the error occurred (e.g., "author.contacts")
    pub path: Option<String>,
    /// Environment being resolved when the error occurred
    pub environment: Option<String>,
    /// Source file, when the error came from loading one
    pub file: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error parsing YAML/JSON or an interpolation expression
    Parse,
    /// The merged configuration does not satisfy the site schema
    Schema(SchemaErrorKind),
    /// No configuration source exists for the environment
    SourceNotFound { environment: String },
    /// An `${env:...}` reference names an unset variable and has no default
    EnvNotFound { var_name: String },
    /// I/O error reading a source
    Io,
    /// A process-wide configuration has already been installed
    AlreadyInstalled,
    /// Internal error (bug in siteconf)
    Internal,
}

/// Specific schema violations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// A required field is absent
    MissingField,
    /// A field has the wrong type or violates a constraint
    InvalidValue,
    /// `url` is not an absolute http(s) URL
    InvalidUrl,
    /// Two menu entries share a path
    DuplicateMenuPath { menu_path: String },
    /// A contact key is not one of the known channels
    UnknownContactChannel { channel: String },
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            environment: None,
            file: None,
            help: None,
            cause: None,
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Parse)
        }
    }

    /// Create an I/O error for a file that exists but could not be read
    pub fn io(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create an error for an environment with no overlay
    pub fn source_not_found(environment: impl Into<String>, known: &[String]) -> Self {
        let env = environment.into();
        let known_str = if known.is_empty() {
            "(none)".to_string()
        } else {
            known.join(", ")
        };
        Self {
            environment: Some(env.clone()),
            help: Some(format!(
                "Add an overlay for '{}' or select one of the known environments: {}",
                env, known_str
            )),
            ..Self::new(ErrorKind::SourceNotFound { environment: env })
        }
    }

    /// Create an error for a missing base configuration file
    pub fn base_not_found(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            help: Some("Create a site.yaml file holding the base configuration".into()),
            ..Self::new(ErrorKind::SourceNotFound {
                environment: crate::environment::BASE.into(),
            })
        }
    }

    /// Create an env var not found error
    pub fn env_not_found(var_name: impl Into<String>, config_path: Option<String>) -> Self {
        let var = var_name.into();
        Self {
            path: config_path,
            help: Some(format!(
                "Set the {} environment variable or provide a default: ${{env:{},default=value}}",
                var, var
            )),
            ..Self::new(ErrorKind::EnvNotFound { var_name: var })
        }
    }

    /// Create a missing required field error
    pub fn missing_field(path: impl Into<String>) -> Self {
        let p = path.into();
        Self {
            help: Some(format!("Set '{}' in the base configuration", p)),
            path: Some(p),
            ..Self::new(ErrorKind::Schema(SchemaErrorKind::MissingField))
        }
    }

    /// Create a validation error for a value that breaks a constraint
    pub fn invalid_value(path: impl Into<String>, message: impl Into<String>) -> Self {
        let p = path.into();
        Self {
            path: if p.is_empty() || p == "<root>" {
                None
            } else {
                Some(p)
            },
            help: Some("Fix the value to match the site schema".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Schema(SchemaErrorKind::InvalidValue))
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(
        path: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some("Use an absolute URL such as https://example.com".into()),
            cause: Some(format!("'{}': {}", url.into(), message.into())),
            ..Self::new(ErrorKind::Schema(SchemaErrorKind::InvalidUrl))
        }
    }

    /// Create a duplicate menu path error
    pub fn duplicate_menu_path(path: impl Into<String>, menu_path: impl Into<String>) -> Self {
        let mp = menu_path.into();
        Self {
            path: Some(path.into()),
            help: Some(format!("Remove or rename one of the entries for '{}'", mp)),
            ..Self::new(ErrorKind::Schema(SchemaErrorKind::DuplicateMenuPath {
                menu_path: mp,
            }))
        }
    }

    /// Create an unknown contact channel error
    pub fn unknown_contact_channel(path: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(format!(
                "Known channels: {}",
                crate::site::ContactChannel::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            ..Self::new(ErrorKind::Schema(SchemaErrorKind::UnknownContactChannel {
                channel: channel.into(),
            }))
        }
    }

    /// Create an error for a second install of the process-wide config
    pub fn already_installed() -> Self {
        Self {
            help: Some("Resolve the site configuration once at startup".into()),
            ..Self::new(ErrorKind::AlreadyInstalled)
        }
    }

    /// Create an internal error (bug in siteconf)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in siteconf. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Internal)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add environment context to the error, unless one is already set
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        if self.environment.is_none() {
            self.environment = Some(environment.into());
        }
        self
    }

    /// Add source file context to the error
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Whether this error is a schema violation
    pub fn is_schema(&self) -> bool {
        matches!(self.kind, ErrorKind::Schema(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::Schema(s) => match s {
                SchemaErrorKind::MissingField => write!(f, "Missing required field")?,
                SchemaErrorKind::InvalidValue => write!(f, "Validation error")?,
                SchemaErrorKind::InvalidUrl => write!(f, "Invalid URL")?,
                SchemaErrorKind::DuplicateMenuPath { menu_path } => {
                    write!(f, "Duplicate menu path: {}", menu_path)?
                }
                SchemaErrorKind::UnknownContactChannel { channel } => {
                    write!(f, "Unknown contact channel: {}", channel)?
                }
            },
            ErrorKind::SourceNotFound { environment } => {
                write!(f, "No configuration source for environment: {}", environment)?
            }
            ErrorKind::EnvNotFound { var_name } => {
                write!(f, "Environment variable not found: {}", var_name)?
            }
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::AlreadyInstalled => write!(f, "Site configuration already installed")?,
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(env) = &self.environment {
            write!(f, "\n  Environment: {}", env)?;
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(file) = &self.file {
            write!(f, "\n  File: {}", file)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
