//! SNMP Poller Binary Entry Point
//!
//! Polls the configured hosts on a fixed interval and writes one JSON object
//! per table row to stdout or the configured output file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use snmp_poller::{
    AppConfig, ColumnTable, Host, HostSettings, JsonLinesWriter, RunContext, Scheduler,
    SnmpClient, config::parse_duration, sink,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// SNMP table poller
#[derive(Parser, Debug)]
#[command(name = "snmp-poller", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/poller.yaml",
        env = "SNMP_POLLER_CONFIG"
    )]
    config: String,

    /// Polling interval in seconds (overrides config file)
    #[arg(long, env = "SNMP_POLLER_INTERVAL")]
    interval: Option<u64>,

    /// Community string (overrides config file)
    #[arg(long, env = "SNMP_POLLER_COMMUNITY", hide_env_values = true)]
    community: Option<String>,

    /// JSON-lines output file (overrides config file)
    #[arg(short, long, env = "SNMP_POLLER_OUTPUT")]
    output: Option<PathBuf>,

    /// Grace period for in-flight hosts on shutdown, e.g. "5s" (overrides config file)
    #[arg(long, env = "SNMP_POLLER_SHUTDOWN_GRACE", value_parser = parse_duration)]
    shutdown_grace: Option<Duration>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Records go to stdout, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,snmp_poller=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // CLI > ENV > config file
    if let Some(interval) = cli.interval {
        config.interval = interval;
    }
    if let Some(community) = cli.community {
        config.community = community;
    }
    if let Some(output) = cli.output {
        config.output = Some(output);
    }
    if let Some(grace) = cli.shutdown_grace {
        config.shutdown_grace = grace;
    }
    config.validate()?;

    let columns = ColumnTable::load_or_bundled(config.column_table_path.as_deref())?;
    let unknown = columns.unknown(&config.columns);
    if !unknown.is_empty() {
        tracing::warn!(
            aliases = ?unknown,
            "Column aliases missing from the column table will be skipped"
        );
    }

    let settings = HostSettings::from_config(&config);
    let mut hosts = Vec::with_capacity(config.hosts.len());
    for name in &config.hosts {
        let host = Host::resolve(name, settings.clone())
            .await
            .map_err(|e| format!("failed to resolve host '{name}': {e}"))?;
        tracing::debug!(host = %host.name, address = %host.address, "Host resolved");
        hosts.push(host);
    }

    tracing::info!(
        "Polling {} host(s) every {}s, {} column(s), table of {} alias(es)",
        hosts.len(),
        config.interval,
        config.columns.len(),
        columns.len(),
    );

    // A dead output stops the scheduler as well
    let cancel = CancellationToken::new();
    let (sink, rx) = sink::channel(config.channel_capacity);
    let writer = match &config.output {
        Some(path) => {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            tracing::info!("Writing records to: {}", path.display());
            JsonLinesWriter::new(rx, file).spawn(cancel.clone())
        }
        None => JsonLinesWriter::new(rx, tokio::io::stdout()).spawn(cancel.clone()),
    };

    let ctx = RunContext::new(&config, hosts, columns);
    let scheduler = Scheduler::new(ctx, Arc::new(SnmpClient::new()), Arc::new(sink.clone()))
        .with_cancellation(cancel);

    tokio::spawn(shutdown_signal(scheduler.cancellation_token()));
    tracing::info!("Press Ctrl+C to shutdown");

    scheduler.run().await;

    // Close the channel so the writer drains and exits
    drop(scheduler);
    let dropped = sink.dropped_records();
    drop(sink);

    match writer.await? {
        Ok(written) => tracing::info!(written, dropped, "Output writer finished"),
        Err(e) => {
            tracing::warn!(dropped, "Records dropped after output failure");
            return Err(e.into());
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Stopping scheduler...");
    token.cancel();
}
