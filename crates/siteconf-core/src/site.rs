//! Typed site configuration
//!
//! [`SiteConfig`] is what downstream tooling consumes. It is only built from
//! a value tree that passed [`Schema`] validation, and exposes its fields
//! through getters so it stays read-only once resolved.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::schema::{value_to_json, Schema};
use crate::value::Value;

/// Posts per page when no layer sets `postsPerPage`
pub const DEFAULT_POSTS_PER_PAGE: u32 = 4;

/// Resolved configuration for one site and environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    url: String,
    title: String,
    subtitle: String,
    copyright: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    disqus_shortname: Option<String>,
    #[serde(default = "default_posts_per_page")]
    posts_per_page: NonZeroU32,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    google_analytics_id: Option<String>,
    #[serde(default)]
    menu: Vec<MenuItem>,
    author: Author,
}

fn default_posts_per_page() -> NonZeroU32 {
    NonZeroU32::new(DEFAULT_POSTS_PER_PAGE).unwrap_or(NonZeroU32::MIN)
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl SiteConfig {
    /// Build from a value tree, validating it against the site schema first
    pub fn from_value(value: &Value, schema: &Schema) -> Result<Self> {
        schema.validate(value)?;
        Self::from_validated(value)
    }

    pub(crate) fn from_validated(value: &Value) -> Result<Self> {
        serde_json::from_value(value_to_json(value))
            .map_err(|e| Error::invalid_value("<root>", e.to_string()))
    }

    /// Parse and validate a complete configuration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_value(&value, &Schema::site()?)
    }

    /// Parse and validate a complete configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))?;
        Self::from_value(&value, &Schema::site()?)
    }

    /// Export as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::internal(e.to_string()))
    }

    /// Export as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::internal(e.to_string()))
    }

    /// Absolute base URL of the site
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn copyright(&self) -> &str {
        &self.copyright
    }

    /// Disqus shortname, `None` when comments are disabled
    pub fn disqus_shortname(&self) -> Option<&str> {
        self.disqus_shortname.as_deref()
    }

    pub fn posts_per_page(&self) -> u32 {
        self.posts_per_page.get()
    }

    /// Analytics tracking ID, `None` when analytics are disabled
    pub fn google_analytics_id(&self) -> Option<&str> {
        self.google_analytics_id.as_deref()
    }

    /// Menu entries in declaration order
    pub fn menu(&self) -> &[MenuItem] {
        &self.menu
    }

    pub fn author(&self) -> &Author {
        &self.author
    }
}

impl fmt::Display for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let converted = serde_yaml::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", converted)
    }
}

/// A navigation menu entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    label: String,
    path: String,
}

impl MenuItem {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Site-relative path, always starting with `/`
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Author metadata shown alongside posts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    name: String,
    photo: String,
    bio: String,
    #[serde(default, deserialize_with = "null_as_default")]
    contacts: IndexMap<ContactChannel, Contact>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Author {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path or URL of the author photo
    pub fn photo(&self) -> &str {
        &self.photo
    }

    pub fn bio(&self) -> &str {
        &self.bio
    }

    /// Every declared channel, including disabled ones, in declaration order
    pub fn contacts(&self) -> &IndexMap<ContactChannel, Contact> {
        &self.contacts
    }

    /// Look up a channel; `None` if it was never declared
    pub fn contact(&self, channel: ContactChannel) -> Option<&Contact> {
        self.contacts.get(&channel)
    }

    /// Channels to render, in declaration order, with their values
    pub fn enabled_contacts(&self) -> impl Iterator<Item = (ContactChannel, &str)> + '_ {
        self.contacts
            .iter()
            .filter_map(|(channel, contact)| contact.value().map(|v| (*channel, v)))
    }
}

/// The fixed set of contact channels a site may link to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactChannel {
    Twitter,
    Github,
    Rss,
    Facebook,
    Instagram,
    Email,
    Telegram,
    Vkontakte,
}

/// Error for a channel name outside [`ContactChannel::ALL`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown contact channel '{0}'")]
pub struct UnknownChannel(pub String);

impl ContactChannel {
    pub const ALL: [ContactChannel; 8] = [
        ContactChannel::Twitter,
        ContactChannel::Github,
        ContactChannel::Rss,
        ContactChannel::Facebook,
        ContactChannel::Instagram,
        ContactChannel::Email,
        ContactChannel::Telegram,
        ContactChannel::Vkontakte,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactChannel::Twitter => "twitter",
            ContactChannel::Github => "github",
            ContactChannel::Rss => "rss",
            ContactChannel::Facebook => "facebook",
            ContactChannel::Instagram => "instagram",
            ContactChannel::Email => "email",
            ContactChannel::Telegram => "telegram",
            ContactChannel::Vkontakte => "vkontakte",
        }
    }
}

impl FromStr for ContactChannel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact channel's value. An empty or null value disables the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Enabled(String),
    Disabled,
}

impl Contact {
    /// The URL or handle, if the channel is enabled
    pub fn value(&self) -> Option<&str> {
        match self {
            Contact::Enabled(v) => Some(v),
            Contact::Disabled => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Contact::Enabled(_))
    }
}

impl Serialize for Contact {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.value().unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for Contact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            Some(v) if !v.trim().is_empty() => Contact::Enabled(v),
            _ => Contact::Disabled,
        })
    }
}
