use crate::core::{ProviderRegistry, DEFAULT_PROBE_TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "MEDIA_RESOLVER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe_timeout_secs: u64,
    pub user_agent: String,
    #[serde(rename = "providers")]
    pub registry: ProviderRegistry,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT.as_secs(),
            user_agent: format!("media-resolver/{}", env!("CARGO_PKG_VERSION")),
            registry: ProviderRegistry::default(),
        }
    }
}

impl Config {
    /// Reads `path`, or the file named by `MEDIA_RESOLVER_CONFIG`, falling
    /// back to the built-in registry when neither is set.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                let config = Self::from_toml(&text)
                    .with_context(|| format!("invalid config {}", path.display()))?;
                tracing::debug!("loaded config from {}", path.display());
                config
            }
            None => Self::default(),
        };

        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout_secs == 0 {
            anyhow::bail!("probe_timeout_secs must be at least 1");
        }
        self.registry.validate()?;
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
