// ███████╗ ██████╗██████╗ ███████╗███████╗███╗   ██╗███████╗██████╗
// ██╔════╝██╔════╝██╔══██╗██╔════╝██╔════╝████╗  ██║██╔════╝██╔══██╗
// ███████╗██║     ██████╔╝█████╗  █████╗  ██╔██╗ ██║█████╗  ██████╔╝
// ╚════██║██║     ██╔══██╗██╔══╝  ██╔══╝  ██║╚██╗██║██╔══╝  ██╔══██╗
// ███████║╚██████╗██║  ██║███████╗███████╗██║ ╚████║███████╗██║  ██║
// ╚══════╝ ╚═════╝╚═╝  ╚═╝╚══════╝╚══════╝╚═╝  ╚═══╝╚══════╝╚═╝  ╚═╝
//
// R E L A Y
//
// Ask Chartink which stocks match a scan. Tell a Telegram chat the answer.
// Retry when Chartink sulks, and tell the chat about that too.

mod config;
mod error;
mod format;
mod metrics;
mod models;
mod notifier;
mod poller;
mod scanners;
mod scheduler;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, RunMode};
use crate::metrics::MetricsCollector;
use crate::notifier::TelegramNotifier;
use crate::poller::ScreenerPoller;
use crate::scanners::chartink_scanner::ChartinkScanner;
use crate::scheduler::DailyTrigger;

fn print_banner() {
    let banner = r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║              📈  SCREENER RELAY  ➜  📨                       ║
    ║                                                              ║
    ║   Source:   Chartink screener (CSRF-token scrape + POST)     ║
    ║   Sink:     Telegram bot, HTML parse mode                    ║
    ║   Policy:   fixed-delay retries, every outcome reported      ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#;
    println!("{}", banner);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .init();

    print_banner();

    info!("Screener relay initializing...");

    let config = Config::from_env();
    info!(
        screener_url = %config.screener_url,
        chat_id = %config.telegram_chat_id,
        run_mode = ?config.run_mode,
        max_attempts = config.max_attempts,
        "Configuration loaded"
    );

    let metrics = Arc::new(MetricsCollector::new());
    let scanner = ChartinkScanner::new(&config);
    let notifier = TelegramNotifier::new(&config).context("failed to build Telegram client")?;
    let poller = ScreenerPoller::new(&config, scanner, notifier, metrics)
        .context("configuration is incomplete")?;

    match config.run_mode {
        RunMode::Once => {
            poller.run_once().await;
        }
        RunMode::Scheduled => {
            if config.run_on_startup {
                info!("Running immediately on startup");
                poller.run_once().await;
            }

            let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
            let trigger = DailyTrigger::from_config(&config);

            let wait_for_signal = async move {
                match signal::ctrl_c().await {
                    Ok(()) => warn!("Shutdown signal received, finishing any run in flight"),
                    Err(err) => error!("Signal listener error: {}", err),
                }
                let _ = shutdown_tx.send(true);
            };

            tokio::join!(
                scheduler::run_scheduled(
                    &poller,
                    trigger,
                    config.schedule_check_interval,
                    Utc::now,
                    &mut shutdown_rx,
                ),
                wait_for_signal,
            );
        }
    }

    info!(metrics = ?poller.metrics().snapshot(), "Screener relay offline");
    Ok(())
}
