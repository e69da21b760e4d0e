use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use fourdata_db::models::{ProbabilityFilter, ProbabilitySource};

pub const DEFAULT_CONFIG_FILE: &str = "fourdata.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database file; defaults to `data/fourdata.db` under the working directory.
    pub database: Option<PathBuf>,
    pub listing: ListingConfig,
    pub lucky: LuckyConfig,
    pub auth: AuthConfig,
    pub subscription: SubscriptionConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub per_page: u32,
    pub default_filter: ProbabilityFilter,
    pub default_source: ProbabilitySource,
    /// Chips shown on the home screen.
    pub home_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LuckyConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub base_url: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub entitlement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local hour after which today's draw is considered closed.
    pub cutoff_hour: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            per_page: 100,
            default_filter: ProbabilityFilter::Top,
            default_source: ProbabilitySource::Default,
            home_limit: 40,
        }
    }
}

impl Default for LuckyConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:54321".to_string(),
            redirect_uri: "fourdata://auth/callback".to_string(),
        }
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            entitlement: "premium".to_string(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { cutoff_hour: 21 }
    }
}

impl AppConfig {
    /// Explicit path must exist; otherwise `fourdata.toml` is read when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config {:?}", path))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Invalid config {:?}", path))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw)?;
        if config.listing.per_page == 0 {
            anyhow::bail!("listing.per_page must be positive");
        }
        if config.schedule.cutoff_hour > 23 {
            anyhow::bail!("schedule.cutoff_hour must be between 0 and 23");
        }
        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(fourdata_db::db::db_path)
    }
}
