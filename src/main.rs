//! STAYSCOUT — Hotel Price Alert Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the store/pricing/notify seams together, and runs the check
//! scheduler loop with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use stayscout::config;
use stayscout::engine::processor::{AlertProcessor, ProcessorConfig};
use stayscout::engine::runner::CheckRunner;
use stayscout::notify::{DealNotifier, WebhookNotifier};
use stayscout::pricing::{PricingSource, ScraperClient};
use stayscout::store::{AlertStore, SqliteAlertStore};

const BANNER: &str = r#"
 ____  _____  _  __   ______   ____ ___  _   _ _____
/ ___||_   _|/ \ \ \ / / ___| / ___/ _ \| | | |_   _|
\___ \  | | / _ \ \ V /\___ \| |  | | | | | | | | |
 ___) | | |/ ___ \ | |  ___) | |__| |_| | |_| | | |
|____/  |_/_/   \_\|_| |____/ \____\___/ \___/  |_|

  Hotel Price Alert Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        tick_secs = cfg.scheduler.tick_secs,
        workers = cfg.scheduler.workers,
        pricing_url = %cfg.pricing.base_url,
        database = %cfg.database.url,
        "STAYSCOUT starting up"
    );

    // -- Initialise components -------------------------------------------

    let store: Arc<dyn AlertStore> = Arc::new(SqliteAlertStore::connect(&cfg.database.url).await?);

    let pricing: Arc<dyn PricingSource> = Arc::new(ScraperClient::new(
        &cfg.pricing.base_url,
        Duration::from_secs(cfg.pricing.timeout_secs),
    )?);

    let auth_token = cfg
        .notifier
        .auth_token_env
        .as_deref()
        .and_then(|env| std::env::var(env).ok());
    if cfg.notifier.auth_token_env.is_some() && auth_token.is_none() {
        warn!("Delivery auth token env var is set in config but not in the environment");
    }
    let notifier: Arc<dyn DealNotifier> = Arc::new(WebhookNotifier::new(
        &cfg.notifier.delivery_url,
        Duration::from_secs(cfg.notifier.timeout_secs),
        auth_token,
    )?);

    let processor = Arc::new(AlertProcessor::new(
        Arc::clone(&store),
        pricing,
        notifier,
        ProcessorConfig {
            max_deals_per_notice: cfg.scheduler.max_deals_per_notice,
        },
    ));

    let runner = CheckRunner::new(store, processor, cfg.scheduler.workers);

    // -- Main loop -------------------------------------------------------

    let tick = Duration::from_secs(cfg.scheduler.tick_secs);
    let mut interval = tokio::time::interval(tick);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        tick_secs = cfg.scheduler.tick_secs,
        "Entering scheduler loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // An in-flight run completes before shutdown is observed,
                // so no alert is left mid-write with a stale schedule.
                match runner.run_once().await {
                    Ok(summary) => info!(%summary, "Run finished"),
                    Err(e) => error!(error = %e, "Check run failed — retrying on next tick"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("STAYSCOUT shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stayscout=info"));

    let json_logging = std::env::var("STAYSCOUT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
