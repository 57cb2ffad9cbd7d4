//! Command implementations shared by the `chanroute` subcommands

use anyhow::Context;
use chanroute_core::{ApiType, Channel, ChannelId, ChannelStore};
use chanroute_observability::SelectionMetrics;
use chanroute_routing::{ChannelRegistry, ChannelSelector, SelectionRequest, SelectorConfig};
use chanroute_store_postgres::PostgresChannelStore;
use chanroute_store_sqlite::SqliteChannelStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{DatabaseConfig, DatabaseTarget};

/// Open the configured channel store
pub async fn open_store(database: &DatabaseConfig) -> anyhow::Result<Arc<dyn ChannelStore>> {
    match database.target() {
        DatabaseTarget::Sqlite(path) => {
            info!("Opening SQLite channel store at {}", path);
            let store = SqliteChannelStore::new(&path)
                .await
                .with_context(|| format!("Failed to open SQLite store at {}", path))?;
            Ok(Arc::new(store))
        }
        DatabaseTarget::Postgres(url) => {
            info!("Connecting to PostgreSQL channel store");
            let store = PostgresChannelStore::new(&url)
                .await
                .context("Failed to open PostgreSQL store")?;
            Ok(Arc::new(store))
        }
    }
}

/// Write channels and their abilities to the store
pub async fn seed(store: &dyn ChannelStore, channels: &[Channel]) -> anyhow::Result<usize> {
    for channel in channels {
        store
            .upsert_channel(channel)
            .await
            .with_context(|| format!("Failed to seed channel #{}", channel.id))?;
    }
    info!("Seeded {} channels", channels.len());
    Ok(channels.len())
}

/// Parse an API type given as a family name or a numeric code
///
/// Numeric codes are passed through even when unknown, so the selector's
/// handling of unsupported families can be exercised.
pub fn parse_api_type(value: &str) -> anyhow::Result<i32> {
    let value = value.trim();
    if let Ok(code) = value.parse::<i32>() {
        return Ok(code);
    }
    let api_type: ApiType = value.parse()?;
    Ok(api_type.as_i32())
}

/// Build a selector over a registry loaded from `store`
pub async fn build_selector(
    config: &SelectorConfig,
    store: Arc<dyn ChannelStore>,
    metrics: Option<SelectionMetrics>,
) -> anyhow::Result<ChannelSelector> {
    let registry = Arc::new(ChannelRegistry::empty());
    let loaded = registry
        .refresh(store.as_ref())
        .await
        .context("Failed to load channel registry")?;
    info!("Loaded {} enabled channels into the registry", loaded);

    let selector = ChannelSelector::new(config, registry, store);
    Ok(match metrics {
        Some(metrics) => selector.with_metrics(metrics),
        None => selector,
    })
}

/// Selection counts over repeated attempts
#[derive(Debug, Default)]
pub struct SimulationReport {
    pub trials: usize,
    pub picks: BTreeMap<ChannelId, (String, usize)>,
    pub not_found: usize,
    pub errors: usize,
}

impl SimulationReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} trials\n", self.trials));
        for (id, (name, count)) in &self.picks {
            let share = if self.trials == 0 {
                0.0
            } else {
                *count as f64 * 100.0 / self.trials as f64
            };
            out.push_str(&format!(
                "  #{:<6} {:<24} {:>8} {:>7.2}%\n",
                id, name, count, share
            ));
        }
        if self.not_found > 0 {
            out.push_str(&format!("  not found: {}\n", self.not_found));
        }
        if self.errors > 0 {
            out.push_str(&format!("  errors: {}\n", self.errors));
        }
        out
    }
}

/// Run `trials` selections and tally the outcomes
pub async fn simulate(
    selector: &ChannelSelector,
    request: &SelectionRequest,
    trials: usize,
) -> SimulationReport {
    let mut report = SimulationReport {
        trials,
        ..Default::default()
    };

    for _ in 0..trials {
        match selector.select_channel(request).await {
            Ok(Some(channel)) => {
                report
                    .picks
                    .entry(channel.id)
                    .or_insert_with(|| (channel.name.clone(), 0))
                    .1 += 1;
            }
            Ok(None) => report.not_found += 1,
            Err(e) => {
                warn!("Selection failed: {}", e);
                report.errors += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanroute_core::{ChannelStatus, ChannelType};
    use tempfile::tempdir;

    fn channels() -> Vec<Channel> {
        vec![
            Channel::new(1, ChannelType::OPENAI)
                .with_models(["gpt-4"])
                .with_priority(10)
                .with_weight(50),
            Channel::new(2, ChannelType::OPENAI)
                .with_models(["gpt-4"])
                .with_priority(10)
                .with_weight(50),
            Channel::new(3, ChannelType::OPENAI)
                .with_models(["gpt-4"])
                .with_priority(5)
                .with_weight(100),
            Channel::new(4, ChannelType::OPENAI)
                .with_models(["gpt-4"])
                .with_priority(99)
                .with_status(ChannelStatus::ManuallyDisabled),
        ]
    }

    #[test]
    fn test_parse_api_type() {
        assert_eq!(parse_api_type("openai").unwrap(), 0);
        assert_eq!(parse_api_type("Anthropic").unwrap(), 1);
        assert_eq!(parse_api_type("9").unwrap(), 9);
        assert_eq!(parse_api_type("4242").unwrap(), 4242);
        assert!(parse_api_type("carrier-pigeon").is_err());
    }

    #[tokio::test]
    async fn test_seed_and_simulate_both_paths() {
        let dir = tempdir().unwrap();
        let database = DatabaseConfig {
            url: format!("sqlite:{}", dir.path().join("cli.db").display()),
        };
        let store = open_store(&database).await.unwrap();
        assert_eq!(seed(store.as_ref(), &channels()).await.unwrap(), 4);

        let request = SelectionRequest::new("default", "gpt-4", ApiType::OpenAI);
        for memory_cache_enabled in [true, false] {
            let config = SelectorConfig {
                memory_cache_enabled,
                query_timeout_ms: None,
            };
            let selector = build_selector(&config, Arc::clone(&store), None)
                .await
                .unwrap();

            let report = simulate(&selector, &request, 200).await;
            assert_eq!(report.trials, 200);
            assert_eq!(report.errors, 0);
            assert_eq!(report.not_found, 0);
            assert!(report.picks.keys().all(|id| *id == 1 || *id == 2));

            let retry = simulate(&selector, &request.clone().with_retry(3), 20).await;
            assert_eq!(retry.picks.keys().copied().collect::<Vec<_>>(), vec![3]);
        }
    }

    #[tokio::test]
    async fn test_simulate_counts_misses_and_errors() {
        let dir = tempdir().unwrap();
        let database = DatabaseConfig {
            url: dir.path().join("cli.db").display().to_string(),
        };
        let store = open_store(&database).await.unwrap();
        seed(store.as_ref(), &channels()).await.unwrap();

        let config = SelectorConfig {
            memory_cache_enabled: false,
            query_timeout_ms: None,
        };
        let selector = build_selector(&config, store, None).await.unwrap();

        let unknown = SelectionRequest::new("default", "unknown-model", ApiType::OpenAI);
        let report = simulate(&selector, &unknown, 5).await;
        assert_eq!(report.not_found, 5);
        assert!(report.picks.is_empty());

        let unsupported =
            SelectionRequest::new("default", "gpt-4", ApiType::OpenAI).with_api_type_code(4242);
        let report = simulate(&selector, &unsupported, 3).await;
        assert_eq!(report.errors, 3);
        assert!(report.render().contains("errors: 3"));
    }

    #[test]
    fn test_render_report() {
        let mut report = SimulationReport {
            trials: 4,
            ..Default::default()
        };
        report.picks.insert(1, ("primary".to_string(), 3));
        report.not_found = 1;

        let text = report.render();
        assert!(text.starts_with("4 trials"));
        assert!(text.contains("primary"));
        assert!(text.contains("75.00%"));
        assert!(text.contains("not found: 1"));
    }
}
