//! siteconf-core: typed, environment-aware site configuration
//!
//! A site is described by one base configuration plus a partial overlay per
//! deployment environment. Resolving an environment merges the two,
//! validates the result against a fixed schema and returns an immutable
//! [`SiteConfig`].
//!
//! # Example
//!
//! ```rust
//! use siteconf_core::{ConfigResolver, ConfigSources, EnvironmentId};
//!
//! let yaml = r#"
//! base:
//!   url: http://localhost:8000
//!   title: Blog by Derek Worthen
//!   subtitle: ASP.NET Core, Blazor and TypeScript.
//!   copyright: All rights reserved.
//!   author:
//!     name: Derek Worthen
//!     photo: /photo.jpg
//!     bio: ASP.NET Core, Blazor and TypeScript.
//! environments:
//!   production:
//!     url: https://derekworthen.com
//! "#;
//!
//! let resolver = ConfigResolver::new(ConfigSources::from_yaml(yaml).unwrap()).unwrap();
//! let site = resolver.resolve(&EnvironmentId::new("production").unwrap()).unwrap();
//! assert_eq!(site.url(), "https://derekworthen.com");
//! assert_eq!(site.posts_per_page(), 4);
//! ```

pub mod environment;
pub mod error;
pub mod interpolation;
pub mod resolver;
pub mod schema;
pub mod site;
pub mod source;
pub mod value;

pub use environment::EnvironmentId;
pub use error::{Error, ErrorKind, Result, SchemaErrorKind};
pub use resolver::{
    install, site_config, ConfigResolver, MergedConfig, UnknownEnvironmentPolicy,
};
pub use schema::Schema;
pub use site::{Author, Contact, ContactChannel, MenuItem, SiteConfig};
pub use source::ConfigSources;
pub use value::{MergePolicy, Value};
