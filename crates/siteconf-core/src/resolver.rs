//! Resolution of a site configuration for one environment
//!
//! Resolution merges the base configuration with the overlay for the
//! selected environment, expands `${env:...}` references, validates the
//! result against the site schema and returns a typed [`SiteConfig`].
//! Given the same sources and variables, it always produces the same result.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;

use crate::environment::{EnvironmentId, BASE};
use crate::error::{Error, Result};
use crate::interpolation::{self, ProcessEnv, VariableSource};
use crate::schema::Schema;
use crate::site::SiteConfig;
use crate::source::ConfigSources;
use crate::value::{MergePolicy, SourceMap, Value};

/// What to do when asked for an environment that has no overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownEnvironmentPolicy {
    /// Fail with a `SourceNotFound` error
    #[default]
    Fail,
    /// Log a warning and resolve the base configuration alone
    FallbackToBase,
}

/// The merged value tree for an environment, before typing
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    /// Merged and interpolated configuration
    pub value: Value,
    /// Which layer (`base` or an environment name) provided each path
    pub sources: SourceMap,
}

/// Resolves [`SiteConfig`]s from a set of sources
#[derive(Clone)]
pub struct ConfigResolver {
    sources: ConfigSources,
    schema: Schema,
    merge_policy: MergePolicy,
    unknown_environment: UnknownEnvironmentPolicy,
    variables: Arc<dyn VariableSource + Send + Sync>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("sources", &self.sources)
            .field("merge_policy", &self.merge_policy)
            .field("unknown_environment", &self.unknown_environment)
            .finish_non_exhaustive()
    }
}

impl ConfigResolver {
    /// Create a resolver using the built-in site schema and the process
    /// environment for `${env:...}` lookups
    pub fn new(sources: ConfigSources) -> Result<Self> {
        Ok(Self {
            sources,
            schema: Schema::site()?,
            merge_policy: MergePolicy::site(),
            unknown_environment: UnknownEnvironmentPolicy::default(),
            variables: Arc::new(ProcessEnv),
        })
    }

    /// Set the policy for environments without an overlay
    pub fn with_unknown_environment(mut self, policy: UnknownEnvironmentPolicy) -> Self {
        self.unknown_environment = policy;
        self
    }

    /// Use a custom variable source for `${env:...}` lookups
    pub fn with_variables(
        mut self,
        variables: impl VariableSource + Send + Sync + 'static,
    ) -> Self {
        self.variables = Arc::new(variables);
        self
    }

    pub fn sources(&self) -> &ConfigSources {
        &self.sources
    }

    /// Environments with an overlay, in declaration order
    pub fn environments(&self) -> Vec<EnvironmentId> {
        self.sources.environments().cloned().collect()
    }

    /// Resolve the configuration for an environment
    pub fn resolve(&self, environment: &EnvironmentId) -> Result<SiteConfig> {
        let merged = self.merged_value(environment)?;
        self.schema
            .validate(&merged.value)
            .and_then(|()| SiteConfig::from_validated(&merged.value))
            .map_err(|e| e.with_environment(environment.as_str()))
    }

    /// Resolve the base configuration and every declared environment
    ///
    /// Stops at the first environment that fails.
    pub fn resolve_all(&self) -> Result<IndexMap<EnvironmentId, SiteConfig>> {
        std::iter::once(EnvironmentId::base())
            .chain(self.environments())
            .map(|env| self.resolve(&env).map(|config| (env, config)))
            .collect()
    }

    /// Validate one environment and collect all problems found
    pub fn validate(&self, environment: &EnvironmentId) -> Vec<Error> {
        match self.merged_value(environment) {
            Ok(merged) => self
                .schema
                .validate_collect(&merged.value)
                .into_iter()
                .map(|e| e.with_environment(environment.as_str()))
                .collect(),
            Err(e) => vec![e],
        }
    }

    /// Validate the base configuration and every declared environment
    pub fn validate_all(&self) -> Vec<Error> {
        std::iter::once(EnvironmentId::base())
            .chain(self.environments())
            .flat_map(|env| self.validate(&env))
            .collect()
    }

    /// Merge and interpolate the layers for an environment without
    /// validating the result
    pub fn merged_value(&self, environment: &EnvironmentId) -> Result<MergedConfig> {
        let mut value = self.sources.base().clone();
        let mut sources = SourceMap::new();
        value.collect_leaf_paths("", &self.merge_policy, BASE, &mut sources);

        if let Some(overlay) = self.overlay_for(environment)? {
            log::debug!("Applying overlay for environment `{}`", environment);
            value.merge_tracking_sources(
                overlay.clone(),
                &self.merge_policy,
                environment.as_str(),
                &mut sources,
            );
        }

        interpolation::expand(&mut value, self.variables.as_ref())
            .map_err(|e| e.with_environment(environment.as_str()))?;

        Ok(MergedConfig { value, sources })
    }

    fn overlay_for(&self, environment: &EnvironmentId) -> Result<Option<&Value>> {
        if environment.is_base() {
            return Ok(None);
        }
        if let Some(overlay) = self.sources.overlay(environment) {
            return Ok(Some(overlay));
        }
        match self.unknown_environment {
            UnknownEnvironmentPolicy::Fail => {
                let known: Vec<String> = self
                    .sources
                    .environments()
                    .map(|e| e.to_string())
                    .collect();
                Err(Error::source_not_found(environment.as_str(), &known))
            }
            UnknownEnvironmentPolicy::FallbackToBase => {
                log::warn!(
                    "No overlay for environment `{}`, using the base configuration",
                    environment
                );
                Ok(None)
            }
        }
    }

    /// Resolve an environment and install it as the process-wide config
    pub fn resolve_and_install(
        &self,
        environment: &EnvironmentId,
    ) -> Result<&'static SiteConfig> {
        install(self.resolve(environment)?)
    }
}

static SITE_CONFIG: OnceLock<SiteConfig> = OnceLock::new();

/// Install the process-wide site configuration
///
/// Only the first call succeeds; the installed value never changes.
pub fn install(config: SiteConfig) -> Result<&'static SiteConfig> {
    SITE_CONFIG
        .set(config)
        .map_err(|_| Error::already_installed())?;
    SITE_CONFIG
        .get()
        .ok_or_else(|| Error::internal("site configuration missing after install"))
}

/// The process-wide site configuration, if one has been installed
pub fn site_config() -> Option<&'static SiteConfig> {
    SITE_CONFIG.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, SchemaErrorKind};
    use crate::site::{Contact, ContactChannel};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const SOURCES: &str = r##"
base:
  url: http://localhost:8000
  title: Blog by Derek Worthen
  subtitle: ASP.NET Core, Blazor and TypeScript.
  copyright: © All rights reserved.
  disqusShortname: ""
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
environments:
  local: {}
  production:
    url: https://derekworthen.com
    disqusShortname: blog-derekworthen-com
  pages:
    url: https://dworthen.github.io
    disqusShortname: ""
"##;

    fn resolver() -> ConfigResolver {
        ConfigResolver::new(ConfigSources::from_yaml(SOURCES).unwrap())
            .unwrap()
            .with_variables(HashMap::<String, String>::new())
    }

    fn env(name: &str) -> EnvironmentId {
        EnvironmentId::new(name).unwrap()
    }

    fn resolver_with_overlay(overlay: &str) -> ConfigResolver {
        let sources = ConfigSources::from_yaml(SOURCES)
            .unwrap()
            .with_overlay(env("broken"), serde_yaml::from_str(overlay).unwrap())
            .unwrap();
        ConfigResolver::new(sources)
            .unwrap()
            .with_variables(HashMap::<String, String>::new())
    }

    #[test]
    fn test_resolve_production() {
        let site = resolver().resolve(&env("production")).unwrap();

        assert_eq!(site.url(), "https://derekworthen.com");
        assert_eq!(site.disqus_shortname(), Some("blog-derekworthen-com"));
        assert_eq!(site.title(), "Blog by Derek Worthen");
        assert_eq!(site.posts_per_page(), 4);
        assert_eq!(site.google_analytics_id(), Some("UA-116962643-1"));
        assert_eq!(site.menu().len(), 2);
    }

    #[test]
    fn test_resolve_pages() {
        let site = resolver().resolve(&env("pages")).unwrap();

        assert_eq!(site.url(), "https://dworthen.github.io");
        assert_eq!(site.disqus_shortname(), None);
        assert_eq!(site.google_analytics_id(), Some("UA-116962643-1"));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resolver = resolver();
        for name in ["base", "local", "production", "pages"] {
            assert_eq!(
                resolver.resolve(&env(name)).unwrap(),
                resolver.resolve(&env(name)).unwrap()
            );
        }
    }

    #[test]
    fn test_local_matches_base() {
        let resolver = resolver();
        assert_eq!(
            resolver.resolve(&env("local")).unwrap(),
            resolver.resolve(&EnvironmentId::base()).unwrap()
        );
    }

    #[test]
    fn test_unknown_environment_fails_by_default() {
        let err = resolver().resolve(&env("staging")).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::SourceNotFound {
                environment: "staging".into()
            }
        );
        assert!(err.to_string().contains("local, production, pages"));
    }

    #[test]
    fn test_unknown_environment_fallback() {
        let resolver =
            resolver().with_unknown_environment(UnknownEnvironmentPolicy::FallbackToBase);
        let site = resolver.resolve(&env("staging")).unwrap();
        assert_eq!(site, resolver.resolve(&EnvironmentId::base()).unwrap());
        assert_eq!(site.url(), "http://localhost:8000");
    }

    #[test]
    fn test_schema_error_names_environment() {
        let err = resolver_with_overlay("postsPerPage: 0")
            .resolve(&env("broken"))
            .unwrap_err();
        assert!(err.is_schema());
        assert_eq!(err.environment.as_deref(), Some("broken"));
        assert_eq!(err.path.as_deref(), Some("postsPerPage"));
    }

    #[test]
    fn test_overlay_menu_replaces_wholesale() {
        let site = resolver_with_overlay("menu:\n  - {label: About me, path: /pages/about}")
            .resolve(&env("broken"))
            .unwrap();
        let labels: Vec<_> = site.menu().iter().map(|m| m.label()).collect();
        assert_eq!(labels, vec!["About me"]);
    }

    #[test]
    fn test_overlay_duplicate_menu_path() {
        let err = resolver_with_overlay(
            "menu:\n  - {label: Articles, path: /}\n  - {label: Home, path: /}",
        )
        .resolve(&env("broken"))
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Schema(SchemaErrorKind::DuplicateMenuPath {
                menu_path: "/".into()
            })
        );
    }

    #[test]
    fn test_overlay_contacts_replace_wholesale() {
        let site = resolver_with_overlay(
            "author:\n  bio: Writes code.\n  contacts:\n    github: dworthen\n    email: ''",
        )
        .resolve(&env("broken"))
        .unwrap();

        let author = site.author();
        assert_eq!(author.name(), "Derek Worthen");
        assert_eq!(author.bio(), "Writes code.");
        assert_eq!(author.contact(ContactChannel::Rss), None);
        assert_eq!(author.contact(ContactChannel::Email), Some(&Contact::Disabled));
        let enabled: Vec<_> = author.enabled_contacts().collect();
        assert_eq!(enabled, vec![(ContactChannel::Github, "dworthen")]);
    }

    #[test]
    fn test_interpolation_from_variables() {
        let vars: HashMap<String, String> =
            [("DISQUS".to_string(), "from-env".to_string())].into();
        let site = resolver_with_overlay("disqusShortname: ${env:DISQUS}")
            .with_variables(vars)
            .resolve(&env("broken"))
            .unwrap();
        assert_eq!(site.disqus_shortname(), Some("from-env"));
    }

    #[test]
    fn test_interpolation_missing_variable() {
        let err = resolver_with_overlay("disqusShortname: ${env:DISQUS}")
            .resolve(&env("broken"))
            .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::EnvNotFound {
                var_name: "DISQUS".into()
            }
        );
        assert_eq!(err.environment.as_deref(), Some("broken"));
    }

    #[test]
    fn test_merged_value_sources() {
        let merged = resolver().merged_value(&env("production")).unwrap();

        assert_eq!(merged.sources.get("url").map(String::as_str), Some("production"));
        assert_eq!(
            merged.sources.get("disqusShortname").map(String::as_str),
            Some("production")
        );
        assert_eq!(merged.sources.get("title").map(String::as_str), Some("base"));
        assert_eq!(
            merged.sources.get("author.contacts").map(String::as_str),
            Some("base")
        );
    }

    #[test]
    fn test_resolve_all() {
        let all = resolver().resolve_all().unwrap();
        let names: Vec<_> = all.keys().map(EnvironmentId::as_str).collect();
        assert_eq!(names, vec!["base", "local", "production", "pages"]);
    }

    #[test]
    fn test_resolve_all_stops_on_error() {
        assert!(resolver_with_overlay("url: nope").resolve_all().is_err());
    }

    #[test]
    fn test_validate_all() {
        assert!(resolver().validate_all().is_empty());

        let errors = resolver_with_overlay("title: ''\nurl: nope").validate_all();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| e.environment.as_deref() == Some("broken")));
    }

    #[test]
    fn test_validate_single_environment() {
        let resolver = resolver_with_overlay("title: ''\nurl: nope");
        assert!(resolver.validate(&env("production")).is_empty());
        assert_eq!(resolver.validate(&env("broken")).len(), 2);

        let missing = resolver.validate(&env("staging"));
        assert_eq!(missing.len(), 1);
        assert!(matches!(missing[0].kind, ErrorKind::SourceNotFound { .. }));
    }

    #[test]
    fn test_install_once() {
        let resolver = resolver();
        let site = resolver.resolve(&env("production")).unwrap();
        let installed = resolver.resolve_and_install(&env("production")).unwrap();
        assert_eq!(installed, &site);
        assert_eq!(site_config(), Some(&site));

        let err = install(site).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyInstalled);
    }
}
