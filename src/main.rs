// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration structs loaded from JSON
// - schema:    Addresses, wallet rows, sub-query names
// - util:      Token amount scaling, time helpers
// - logging:   Named logger handles and env_logger setup
// - backend:   Token and DWH query clients
// - sink:      InfluxDB writer
// - collector: Row aggregation, cycles, scheduling
// - metrics:   Process-wide runtime counters
//
mod backend;
mod collector;
mod config;
mod logging;
mod metrics;
mod schema;
mod sink;
mod util;

#[cfg(test)]
mod testing;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use backend::{dwh::HttpDwhClient, token::EthTokenClient};
use collector::plugin::{Plugin, WalletPlugin};
use config::Config;
use logging::Logger;
use metrics::METRICS;
use sink::InfluxSink;

const DEFAULT_CONFIG_PATH: &str = "config.json";
const CONFIG_ENV: &str = "WALLET_MONITOR_CONFIG";
const METRICS_REPORT_EVERY: Duration = Duration::from_secs(60);

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Load configuration
// - Initialize logging
// - Build backend clients and the influx sink
// - Run the wallet plugin until Ctrl-C
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path();
    let config = Config::load(&path)?;

    logging::init(config.verbose());
    let log = Logger::root("monitoring");
    info!(
        target: log.target(),
        "loaded {} addresses from {path}",
        config.addresses.len()
    );

    // --------------------------------------------------------
    // Backends and sink share one HTTP connection pool
    // --------------------------------------------------------
    let http = backend::http_client()?;
    let token = Arc::new(EthTokenClient::new(
        http.clone(),
        config.token.url.clone(),
        config.token.contract,
    ));
    let dwh = Arc::new(HttpDwhClient::new(http.clone(), config.dwh.url.clone()));
    let sink = Arc::new(InfluxSink::new(http, &config.influx, log.named("influx"))?);

    let cancel = CancellationToken::new();

    // --------------------------------------------------------
    // Shutdown on Ctrl-C
    // --------------------------------------------------------
    tokio::spawn(cancel_on_interrupt(
        tokio::signal::ctrl_c(),
        cancel.clone(),
        log.clone(),
    ));

    // --------------------------------------------------------
    // Periodic metrics reporter (low-noise)
    // --------------------------------------------------------
    tokio::spawn({
        let cancel = cancel.clone();
        let log = log.named("metrics");
        async move {
            let mut every = tokio::time::interval(METRICS_REPORT_EVERY);
            every.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = every.tick() => info!(target: log.target(), "[METRICS] {}", METRICS.summary()),
                }
            }
        }
    });

    let plugin = WalletPlugin::new(&config, &log, sink, token, dwh);
    info!(target: log.target(), "starting {} plugin", plugin.name());
    plugin.run(cancel).await;

    info!(target: log.target(), "stopped; [METRICS] {}", METRICS.summary());
    Ok(())
}

/// Cancels `cancel` once `interrupt` resolves.
///
/// If the signal listener itself fails, the process keeps collecting;
/// only an actual interrupt stops it.
async fn cancel_on_interrupt(
    interrupt: impl Future<Output = std::io::Result<()>>,
    cancel: CancellationToken,
    log: Logger,
) {
    if let Err(e) = interrupt.await {
        error!(target: log.target(), "failed to listen for Ctrl-C: {e}");
        futures_util::future::pending::<()>().await;
    }
    warn!(target: log.target(), "interrupt received, shutting down");
    cancel.cancel();
}

/// Config path: first CLI argument, then the env var, then `config.json`.
fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}
