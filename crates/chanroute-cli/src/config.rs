use anyhow::Context;
use chanroute_core::Channel;
use chanroute_observability::LoggingConfig;
use chanroute_routing::SelectorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub selector: SelectorConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Channels written to the store by `chanroute seed`
    #[serde(default)]
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `sqlite:<path>` or a `postgres://` connection string
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:chanroute.db".to_string()
}

/// Where a database URL points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Sqlite(String),
    Postgres(String),
}

impl DatabaseConfig {
    pub fn target(&self) -> DatabaseTarget {
        let url = self.url.trim();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return DatabaseTarget::Postgres(url.to_string());
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        DatabaseTarget::Sqlite(path.to_string())
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("CHANROUTE_DATABASE_URL") {
            self.database.url = val;
        }

        // Selector settings
        if let Ok(val) = std::env::var("CHANROUTE_MEMORY_CACHE_ENABLED") {
            match val.parse::<bool>() {
                Ok(enabled) => self.selector.memory_cache_enabled = enabled,
                Err(_) => eprintln!(
                    "Warning: Invalid CHANROUTE_MEMORY_CACHE_ENABLED '{}', ignoring",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("CHANROUTE_QUERY_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => self.selector.query_timeout_ms = Some(ms),
                Err(_) => eprintln!("Warning: Invalid CHANROUTE_QUERY_TIMEOUT_MS '{}', ignoring", val),
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("CHANROUTE_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("CHANROUTE_LOG_JSON") {
            if let Ok(json) = val.parse::<bool>() {
                self.logging.json = json;
            }
        }

        if let Ok(val) = std::env::var("CHANROUTE_LOG_SQL") {
            if let Ok(enabled) = val.parse::<bool>() {
                self.logging.log_sql_queries = enabled;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.selector
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid selector config: {}", e))?;
        for channel in &self.channels {
            channel.validate()?;
        }
        Ok(())
    }
}
