//! `cardauth`: run one card-scan authorization from the command line.
//!
//! Useful for checking a scanner station and the authorization-session
//! backend end to end without opening any of the facility screens.
//!
//! # Usage
//!
//! ```text
//! cardauth [OPTIONS]
//!
//! Options:
//!   --config <PATH>          Config file [default: platform config dir]
//!   --backend-url <URL>      Overrides backend.base_url
//!   --deadline-secs <SECS>   Overrides session.deadline_secs
//!   --no-settle              Skip the cosmetic settle delays
//! ```
//!
//! Press Ctrl-C while waiting for a scan to cancel the authorization; the
//! backend session is disarmed before the process exits.
//!
//! Exit code is 0 when a member was verified and the action ran, 1 otherwise.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cardauth_client::application::{ActionInvoker, Authorizer, SessionController, SettleDelays};
use cardauth_client::infrastructure::storage::config::{load_config, load_config_from, AppConfig};
use cardauth_client::infrastructure::HttpBindingClient;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Card-scan authorization client.
#[derive(Debug, Parser)]
#[command(
    name = "cardauth",
    about = "Run one card-scan authorization against the authorization-session backend",
    version
)]
struct Cli {
    /// Path to a TOML config file.  Defaults to the platform config directory.
    #[arg(long, env = "CARDAUTH_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the backend, e.g. `https://facility.example.com`.
    #[arg(long, env = "CARDAUTH_BACKEND_URL")]
    backend_url: Option<String>,

    /// Seconds to wait for a scan before timing out.
    #[arg(long, env = "CARDAUTH_DEADLINE_SECS")]
    deadline_secs: Option<u64>,

    /// Skip the settle delays around the action.
    #[arg(long)]
    no_settle: bool,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn into_config(self) -> anyhow::Result<(AppConfig, bool)> {
        let mut cfg = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => load_config().context("failed to load config")?,
        };
        if let Some(url) = self.backend_url {
            cfg.backend.base_url = url;
        }
        if let Some(secs) = self.deadline_secs {
            cfg.session.deadline_secs = secs;
        }
        cfg.validate()?;
        Ok((cfg, self.no_settle))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let (cfg, no_settle) = Cli::parse().into_config()?;

    // RUST_LOG takes precedence over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.log_level)),
        )
        .init();

    info!(backend = %cfg.backend.base_url, deadline = ?cfg.deadline(), "cardauth starting");

    let client = HttpBindingClient::new(cfg.backend.base_url.clone(), cfg.request_timeout())?;
    let controller = Arc::new(SessionController::with_deadline(
        Arc::new(client),
        cfg.deadline(),
    ));
    let delays = if no_settle {
        SettleDelays::none()
    } else {
        cfg.settle_delays()
    };
    let authorizer = Authorizer::new(Arc::clone(&controller), ActionInvoker::new(delays));

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let cancel_on_signal = Arc::clone(&controller);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; cancelling authorization");
            cancel_on_signal.cancel();
        }
    });

    // ── Countdown ─────────────────────────────────────────────────────────────
    let mut states = controller.subscribe();
    let countdown = Arc::clone(&controller);
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            match countdown.remaining() {
                Some(left) => println!("{state} ({}s left)", left.as_secs()),
                None => println!("{state}"),
            }
        }
    });

    println!("Scan your card now...");
    let result = authorizer
        .authorize_and_run(|member_id| async move {
            info!(%member_id, "authorized action executed");
            Ok(())
        })
        .await;
    controller.wait_for_cleanup().await;

    match result {
        Ok(member) => {
            println!("Authorized: {} ({})", member.member_name, member.member_id);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "authorization did not complete");
            println!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
