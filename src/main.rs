//! # WildBerry Alert
//!
//! A buyer radar for the wild-berry and dried-fruit trade. It polls public
//! marketplaces, procurement feeds and news alerts for people who want to
//! *buy* (rosehip, aronia, lavender, thyme, ...), and pushes every new match
//! to a Telegram chat.
//!
//! ## Sources
//!
//! OLX, Facebook group mobile pages, SEAP procurement RSS, Agrobiznis, Google
//! Alerts feeds, eBay and Alibaba search results. Each one is enabled and
//! tuned in `config/radar.yaml`.
//!
//! ## Usage
//!
//! ```sh
//! TG_TOKEN=... TG_CHAT=... wildberry_alert --state-dir ./state
//! ```
//!
//! ## Architecture
//!
//! One invocation is one run; schedule it with cron or CI:
//! 1. **Polling**: every enabled source is fetched concurrently (4 at a time)
//! 2. **Gating**: titles from policy-gated sources (OLX) go through the buyer
//!    keyword policy; the others are trusted to their own title filters
//! 3. **Dedup**: `source:id` identities are checked against `seen.json`
//! 4. **Notify**: new listings are sent to Telegram, then state is persisted

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod coordinator;
mod error;
mod keywords;
mod models;
mod notify;
mod sources;
mod store;
mod utils;

use cli::Cli;
use config::RadarConfig;
use coordinator::{Coordinator, StatePaths};
use notify::TelegramNotifier;
use sources::HttpClient;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("wildberry_alert starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(state_dir = %args.state_dir.display(), policy = ?args.policy, "Parsed CLI arguments");

    // Early check: ensure the state dir is writable
    if let Err(e) = ensure_writable_dir(&args.state_dir).await {
        error!(
            path = %args.state_dir.display(),
            error = %e,
            "State directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Load config & build the pipeline ----
    let config = RadarConfig::load(args.config.as_deref()).await?;
    let policy = config.policy(args.policy)?;
    let http = HttpClient::new(&config.user_agent)?;
    let adapters = sources::from_config(&config, &http)?;

    let notifier = TelegramNotifier::new(args.tg_token.clone(), args.tg_chat.clone());
    if !notifier.is_configured() {
        warn!("TG_TOKEN/TG_CHAT not set; matches will be recorded but not sent");
    }

    let coordinator = Coordinator::new(
        adapters,
        policy,
        Arc::new(notifier),
        StatePaths {
            seen: args.seen_path(),
            last_alert: args.last_alert_path(),
        },
    )
    .with_concurrency(args.concurrency);

    // ---- Cancellation: deadline or Ctrl-C ----
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let deadline = Duration::from_secs(args.deadline_secs);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    warn!(secs = deadline.as_secs(), "Run deadline reached");
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        });
    }
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received");
                cancel.cancel();
            }
        });
    }

    // ---- Run ----
    let summary = coordinator.run_once(&cancel).await;
    cancel.cancel();
    let summary = summary?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        new = summary.new_records,
        failed_sources = summary.failed_sources(),
        cancelled = summary.cancelled,
        "Execution complete"
    );

    Ok(())
}
