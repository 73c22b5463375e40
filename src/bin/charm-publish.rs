//! Charm Publisher CLI
//!
//! Publishes the charm branch in the current (or given) directory to the
//! charm store and prints the published URL with its revision.

use anyhow::Result;
use charm_publisher::core::config::{PollConfig, StoreConfig};
use charm_publisher::{
    CharmPublishConfig, CharmPublisher, CharmStoreClient, ConfigLoadOptions, ConfigLoader,
    GitBranch, PublishError, PublishReport, vcs::DEFAULT_GIT_TIMEOUT,
};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Publish a charm to the charm store
#[derive(Parser)]
#[command(name = "charm-publish")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Charm URL, e.g. cs:precise/wordpress (inferred from the push location when omitted)
    #[arg(value_name = "CHARM_URL")]
    url: Option<String>,

    /// Charm branch directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    from: PathBuf,

    /// Charm store URL
    #[arg(long)]
    store_url: Option<String>,

    /// Delay between store polls after pushing, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Give up waiting for the store after this many seconds
    #[arg(long)]
    poll_timeout_secs: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Flags that override configuration files and environment
    fn config_overrides(&self) -> Option<CharmPublishConfig> {
        let store = self.store_url.clone().map(|url| StoreConfig {
            url: Some(url),
            timeout_secs: None,
        });
        let poll = (self.poll_interval_ms.is_some() || self.poll_timeout_secs.is_some()).then(|| {
            PollConfig {
                interval_ms: self.poll_interval_ms,
                timeout_secs: self.poll_timeout_secs,
                max_attempts: None,
            }
        });

        if store.is_none() && poll.is_none() {
            return None;
        }
        Some(CharmPublishConfig {
            store,
            poll,
            ..CharmPublishConfig::default()
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(cli).await {
        Ok(report) => print!("{}", report.output_line()),
        Err(e) => {
            if let Some(error) = e.downcast_ref::<PublishError>() {
                for action in error.suggested_actions() {
                    tracing::info!(code = error.code(), "{}", action);
                }
            }
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<PublishReport> {
    let branch = GitBranch::open(&cli.from, DEFAULT_GIT_TIMEOUT).await?;

    let config = ConfigLoader::load(ConfigLoadOptions {
        project_path: branch.root().to_path_buf(),
        cli_args: cli.config_overrides(),
        env: std::env::vars().collect(),
    })
    .await?;
    tracing::debug!(store = config.store_url(), "configuration loaded");

    let store = CharmStoreClient::from_config(&config)?;
    let publisher = CharmPublisher::from_config(&config, Arc::new(branch), Arc::new(store));

    let report = publisher.run(cli.url.as_deref()).await?;
    tracing::info!(
        state = ?report.state,
        polls = report.polls,
        duration_ms = report.duration_ms,
        "done"
    );

    Ok(report)
}
