//! Checked-in radar configuration: keyword patterns and per-source endpoints.
//!
//! The default file `config/radar.yaml` is embedded at compile time so the
//! binary runs with no files besides its state. A different file can be
//! passed with `--config` / `RADAR_CONFIG`.
//!
//! ```yaml
//! user_agent: "WildBerryBot/1.0"
//! keywords:
//!   buyer: ['cump[ăa]r macese', 'buy dried rosehip']
//!   dried: ['uscat[ăae]?', 'dried']
//! sources:
//!   seap:
//!     timeout_secs: 15
//!     feeds: ["https://e-licitatie.ro/pub/notices-rss?tip=3&cuvinte_cheie=macese"]
//!     title_filter: ['macese|aronia']
//! ```

use crate::error::ConfigError;
use crate::keywords::{Gate, KeywordPolicy, PolicyVariant};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

const DEFAULT_CONFIG: &str = include_str!("../config/radar.yaml");

fn default_user_agent() -> String {
    "WildBerryBot/1.0".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RadarConfig {
    /// Identification header sent with every source request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub keywords: KeywordConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordConfig {
    pub buyer: Vec<String>,
    #[serde(default)]
    pub dried: Vec<String>,
}

/// One optional section per adapter. A missing section disables the adapter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    pub olx: Option<SourceConfig>,
    pub facebook: Option<SourceConfig>,
    pub seap: Option<SourceConfig>,
    pub agrobiznis: Option<SourceConfig>,
    pub google: Option<SourceConfig>,
    pub ebay: Option<SourceConfig>,
    pub alibaba: Option<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Search URL templates, group pages, feeds or listing pages, depending
    /// on the adapter. Templates contain `{kw}`.
    #[serde(alias = "search_urls", alias = "groups", alias = "feeds", alias = "pages", default)]
    pub urls: Vec<String>,
    /// Site root used to resolve relative links.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Regexes that must ALL match a raw title before a record is built.
    #[serde(default)]
    pub title_filter: Vec<String>,
    /// Whether the run's keyword policy also gates this source's records.
    #[serde(default)]
    pub gate: Gate,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn title_filter(&self) -> Result<KeywordPolicy, ConfigError> {
        KeywordPolicy::require_each(&self.title_filter)
    }
}

impl RadarConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RadarConfig = serde_yaml::from_str(yaml)?;
        // Surface bad patterns at startup rather than mid-run.
        config.policy(PolicyVariant::Dried)?;
        for source in config.sources.enabled() {
            source.title_filter()?;
        }
        Ok(config)
    }

    /// Load from `path`, or the embedded default when `None`.
    #[instrument(level = "info", skip_all)]
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let yaml = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ConfigError::Read {
                        path: path.to_path_buf(),
                        source,
                    })?;
                let config = Self::from_yaml(&yaml)?;
                info!(path = %path.display(), "Loaded radar configuration");
                Ok(config)
            }
            None => {
                let config = Self::from_yaml(DEFAULT_CONFIG)?;
                info!("Loaded embedded radar configuration");
                Ok(config)
            }
        }
    }

    /// The coordinator's keyword gate for `variant`.
    pub fn policy(&self, variant: PolicyVariant) -> Result<KeywordPolicy, ConfigError> {
        KeywordPolicy::for_variant(variant, &self.keywords.buyer, &self.keywords.dried)
    }
}

impl SourcesConfig {
    fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        [
            &self.olx,
            &self.facebook,
            &self.seap,
            &self.agrobiznis,
            &self.google,
            &self.ebay,
            &self.alibaba,
        ]
        .into_iter()
        .flatten()
        .filter(|s| s.enabled)
    }
}
