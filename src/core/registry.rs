use crate::core::{MediaType, ResolveError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Placeholder substituted with the percent-encoded target.
pub const QUERY_PLACEHOLDER: &str = "{query}";

pub const REGISTRY_VERSION: u32 = 1;

/// Hint about where a provider usually puts its link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Generic,
    /// Link at the top level (`url`).
    Flat,
    /// Link under a `result` or `data` envelope.
    Nested,
    /// Plain-text body holding the link.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Search,
    Resolve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub url_template: String,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProviderSpec {
    pub fn new(name: &str, url_template: &str) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            dialect: Dialect::Generic,
            media_type: None,
            timeout_secs: None,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    /// Timeouts are kept in whole seconds, rounded up so a provider never
    /// gets less time than asked for.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.timeout_secs = Some(secs.max(1));
        self
    }

    pub fn build_url(&self, target: &str) -> String {
        self.url_template
            .replacen(QUERY_PLACEHOLDER, &urlencoding::encode(target), 1)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Whether this provider takes part in a request for `wanted`.
    pub fn serves(&self, wanted: Option<MediaType>) -> bool {
        match (wanted, self.media_type) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(declared)) => wanted == declared,
        }
    }

    fn validate(&self) -> Result<(), ResolveError> {
        if self.name.trim().is_empty() {
            return Err(ResolveError::Config(
                "provider name must not be empty".to_string(),
            ));
        }

        let placeholders = self.url_template.matches(QUERY_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(ResolveError::Config(format!(
                "provider '{}': url_template must contain exactly one {} placeholder, found {}",
                self.name, QUERY_PLACEHOLDER, placeholders
            )));
        }

        let probe_url = self.build_url("x");
        match Url::parse(&probe_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
            _ => Err(ResolveError::Config(format!(
                "provider '{}': url_template is not an absolute http(s) URL",
                self.name
            ))),
        }
    }
}

/// The ordered provider lists, loaded once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRegistry {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub search: Vec<ProviderSpec>,
    #[serde(default)]
    pub resolve: Vec<ProviderSpec>,
}

fn default_version() -> u32 {
    REGISTRY_VERSION
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            search: vec![ProviderSpec::new(
                "yts",
                "https://my-rest-apis-six.vercel.app/yts?query={query}",
            )],
            resolve: vec![
                ProviderSpec::new(
                    "ytmp3",
                    "https://apis.davidcyriltech.my.id/download/ytmp3?url={query}",
                )
                .with_dialect(Dialect::Nested)
                .with_media_type(MediaType::Audio),
                ProviderSpec::new(
                    "ytmp4",
                    "https://apis.davidcyriltech.my.id/download/ytmp4?url={query}",
                )
                .with_dialect(Dialect::Nested)
                .with_media_type(MediaType::Video),
            ],
        }
    }
}

impl ProviderRegistry {
    pub fn new(search: Vec<ProviderSpec>, resolve: Vec<ProviderSpec>) -> Result<Self, ResolveError> {
        let registry = Self {
            version: REGISTRY_VERSION,
            search,
            resolve,
        };
        registry.validate()?;
        Ok(registry)
    }

    pub fn providers(&self, operation: Operation) -> &[ProviderSpec] {
        match operation {
            Operation::Search => &self.search,
            Operation::Resolve => &self.resolve,
        }
    }

    /// Resolve providers eligible for `wanted`, in registry order.
    pub fn resolvers_for(&self, wanted: Option<MediaType>) -> Vec<ProviderSpec> {
        self.resolve
            .iter()
            .filter(|p| p.serves(wanted))
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.version != REGISTRY_VERSION {
            return Err(ResolveError::Config(format!(
                "unsupported registry version {} (expected {})",
                self.version, REGISTRY_VERSION
            )));
        }

        for (label, list) in [("search", &self.search), ("resolve", &self.resolve)] {
            let mut seen = HashSet::new();
            for spec in list {
                spec.validate()?;
                if !seen.insert(spec.name.as_str()) {
                    return Err(ResolveError::Config(format!(
                        "duplicate {} provider '{}'",
                        label, spec.name
                    )));
                }
            }
        }

        Ok(())
    }
}
