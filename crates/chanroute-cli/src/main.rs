//! ChanRoute CLI
//!
//! Seeds a channel store from a configuration file and exercises channel
//! selection against it.

mod commands;
mod config;

use anyhow::Context;
use chanroute_observability::{SelectionMetrics, init_tracing};
use chanroute_routing::SelectionRequest;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::commands::{build_selector, open_store, parse_api_type, seed, simulate};
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "chanroute")]
#[command(about = "ChanRoute - LLM gateway channel selection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "CHANROUTE_CONFIG",
        global = true
    )]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema and write the configured channels to the store
    Seed,
    /// Select one channel
    Select(SelectArgs),
    /// Repeat a selection and print how often each channel was picked
    Simulate {
        #[command(flatten)]
        selection: SelectArgs,

        /// Number of selections to run
        #[arg(long, default_value = "1000")]
        trials: usize,
    },
    /// Run selections and print the Prometheus metrics they produced
    Metrics {
        #[command(flatten)]
        selection: SelectArgs,

        #[arg(long, default_value = "100")]
        trials: usize,
    },
}

#[derive(Args)]
struct SelectArgs {
    /// Traffic group
    #[arg(long, default_value = "default")]
    group: String,

    /// Requested model name
    #[arg(long)]
    model: String,

    /// API family, by name (openai, anthropic, ...) or numeric code
    #[arg(long, default_value = "openai")]
    api_type: String,

    /// Number of failed attempts so far
    #[arg(long, default_value = "0")]
    retry: usize,

    /// Query the store instead of the in-memory registry
    #[arg(long)]
    no_cache: bool,
}

impl SelectArgs {
    fn request(&self) -> anyhow::Result<SelectionRequest> {
        Ok(SelectionRequest {
            group: self.group.clone(),
            model_name: self.model.clone(),
            api_type: parse_api_type(&self.api_type)?,
            retry_index: self.retry,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    config.merge_env();
    config.validate()?;

    init_tracing(&config.logging).context("Failed to initialize logging")?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path);
    }

    let store = open_store(&config.database).await?;

    match cli.command {
        Commands::Seed => {
            let count = seed(store.as_ref(), &config.channels).await?;
            println!("Seeded {} channels", count);
        }
        Commands::Select(args) => {
            let request = args.request()?;
            let selector = build_selector(&config.selector, store, None).await?;
            if args.no_cache {
                selector.set_memory_cache_enabled(false);
            }

            match selector.select_channel(&request).await? {
                Some(channel) => println!("{}", serde_json::to_string_pretty(channel.as_ref())?),
                None => println!("No eligible channel"),
            }
        }
        Commands::Simulate { selection, trials } => {
            let request = selection.request()?;
            let selector = build_selector(&config.selector, store, None).await?;
            if selection.no_cache {
                selector.set_memory_cache_enabled(false);
            }

            let report = simulate(&selector, &request, trials).await;
            print!("{}", report.render());
        }
        Commands::Metrics { selection, trials } => {
            let request = selection.request()?;
            let metrics = SelectionMetrics::new()?;
            let selector =
                build_selector(&config.selector, store, Some(metrics.clone())).await?;
            if selection.no_cache {
                selector.set_memory_cache_enabled(false);
            }

            simulate(&selector, &request, trials).await;
            print!("{}", metrics.export()?);
        }
    }

    Ok(())
}
