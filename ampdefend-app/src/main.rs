mod dashboard_ui;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ampdefend_core::config::DefendConfig;
use ampdefend_core::feed::AlertFeed;
use ampdefend_core::io_adapters::{IngestAdapter, RelayState};
use ampdefend_core::metrics::MetricsAggregator;
use ampdefend_core::pipeline::IngestPipeline;
use ampdefend_core::webhook::WebhookSender;

#[derive(Parser, Debug)]
#[command(name = "ampdefend", version, about = "AMPDefend — Honeypot Alert Monitoring Service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "ampdefend.toml")]
    config: String,

    /// Log level (overrides config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Snapshot ingest bind address (overrides config file)
    #[arg(long)]
    ingest_bind: Option<String>,

    /// Dashboard API bind address (overrides config file)
    #[arg(long)]
    api_bind: Option<String>,

    /// Webhook URL for alert forwarding (overrides env and config file)
    #[arg(long)]
    webhook_url: Option<String>,

    /// Disable dashboard and relay endpoint
    #[arg(long)]
    no_dashboard: bool,

    /// Generate a default config file and exit
    #[arg(long)]
    generate_config: bool,

    /// Dry-run: load config, validate, print report, exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Generate Config ──────────────────────────────────────────────
    if cli.generate_config {
        let config = DefendConfig::default();
        config.save(&cli.config).map_err(|e| anyhow::anyhow!(e))?;
        println!("Default configuration written to {}", cli.config);
        return Ok(());
    }

    // ── Load Config ──────────────────────────────────────────────────
    let config = DefendConfig::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: {}, using defaults", e);
        DefendConfig::default()
    });

    let log_level = cli.log_level.as_deref().unwrap_or(&config.general.log_level);

    // ── Tracing ──────────────────────────────────────────────────────
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let webhook_url = cli
        .webhook_url
        .clone()
        .unwrap_or_else(|| config.resolved_webhook_url());
    let ingest_bind = cli.ingest_bind.as_deref().unwrap_or(&config.feed.ingest_bind);
    let api_bind = cli.api_bind.as_deref().unwrap_or(&config.dashboard.api_bind);

    info!("AMPDefend v{}", env!("CARGO_PKG_VERSION"));
    info!(collection = %config.feed.collection, "Feed collection");
    info!(url = %webhook_url, backlog = config.webhook.notify_backlog, "Webhook forwarding");

    // ── Pipeline ─────────────────────────────────────────────────────
    let feed = Arc::new(AlertFeed::new(&config.feed.collection));
    let sender = WebhookSender::new(&webhook_url).with_timeout(config.webhook.timeout_secs);
    let aggregator = MetricsAggregator::new(
        config.dashboard.active_honeypots,
        config.dashboard.system_status,
    );
    let pipeline = Arc::new(IngestPipeline::new(
        sender,
        aggregator,
        config.webhook.notify_backlog,
    ));
    let subscription = pipeline.attach(&feed);
    info!(subscribers = feed.subscriber_count(), "Ingest pipeline attached to feed");

    // ── Dry Run ──────────────────────────────────────────────────────
    if cli.dry_run {
        info!(
            ingest_bind = %ingest_bind,
            api_bind = %api_bind,
            honeypots = config.dashboard.active_honeypots,
            "Dry-run complete. Configuration valid."
        );
        subscription.cancel();
        return Ok(());
    }

    // ── Snapshot Ingest Adapter ──────────────────────────────────────
    let ingest_addr = ingest_bind
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid ingest bind address {}: {}", ingest_bind, e))?;
    let ingest = IngestAdapter::new(ingest_addr);
    ingest.start(feed.clone())?;

    // ── Dashboard + Relay ────────────────────────────────────────────
    if !cli.no_dashboard {
        let dash_pipeline = pipeline.clone();
        let relay = RelayState::new(&webhook_url);
        let bind = api_bind.to_string();
        tokio::spawn(async move {
            if let Err(e) = dashboard_ui::start_dashboard(dash_pipeline, relay, &bind).await {
                error!(error = %e, "Dashboard failed");
            }
        });
        info!(addr = %api_bind, "Dashboard available at http://{}", api_bind);
    }

    info!("AMPDefend running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down AMPDefend...");

    // ── Graceful Shutdown ────────────────────────────────────────────
    subscription.cancel();
    info!(
        snapshots = pipeline.snapshots_processed(),
        feed_errors = pipeline.feed_errors(),
        notified = pipeline.tracker().total_claimed(),
        webhook_delivered = pipeline.sender().delivered(),
        webhook_failed = pipeline.sender().failed(),
        snapshots_ingested = ingest.snapshots_received(),
        "Shutdown complete"
    );

    Ok(())
}
