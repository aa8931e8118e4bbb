//! Client configuration.
//!
//! The API URL is a template: `{data_center}` and `{api_version}` are
//! substituted when the base URL is built.

use std::fmt;

pub const DEFAULT_API_URL: &str = "https://{data_center}.api.mailchimp.com/{api_version}/";
pub const DEFAULT_DATA_CENTER: &str = "";
pub const DEFAULT_API_KEY: &str = "";
pub const DEFAULT_API_VERSION: &str = "3.0";

pub const ENV_API_URL: &str = "MAILCHIMP_API_URL";
pub const ENV_DATA_CENTER: &str = "MAILCHIMP_DATA_CENTER";
pub const ENV_API_KEY: &str = "MAILCHIMP_API_KEY";
pub const ENV_API_VERSION: &str = "MAILCHIMP_API_VERSION";

/// Credentials and routing for a `Client`.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub data_center: String,
    pub api_key: String,
    pub api_version: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_center: DEFAULT_DATA_CENTER.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl Config {
    pub fn new(data_center: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            data_center: data_center.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read configuration from `MAILCHIMP_*` environment variables.
    ///
    /// Unset variables fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_url: lookup(ENV_API_URL).unwrap_or(defaults.api_url),
            data_center: lookup(ENV_DATA_CENTER).unwrap_or(defaults.data_center),
            api_key: lookup(ENV_API_KEY).unwrap_or(defaults.api_key),
            api_version: lookup(ENV_API_VERSION).unwrap_or(defaults.api_version),
        }
    }

    /// Override the URL template (proxies, local mock servers).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// The URL template with data center and version filled in.
    pub fn base_url(&self) -> String {
        self.api_url
            .replace("{data_center}", &self.data_center)
            .replace("{api_version}", &self.api_version)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("data_center", &self.data_center)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .finish()
    }
}
