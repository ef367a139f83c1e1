//! Adboard — paid-placement marketplace for storefront ad slots.
//!
//! Main entry point that wires the stores, ledger, pacer, and allocation
//! engine together and starts the HTTP server.

use adboard_allocation::{AllocationEngine, BackgroundDecisionLogger};
use adboard_api::{ApiServer, AppState};
use adboard_core::config::AppConfig;
use adboard_core::event_bus::noop_sink;
use adboard_insights::{HealthScorer, InsightGenerator};
use adboard_ledger::WalletLedger;
use adboard_pacing::BudgetPacer;
use adboard_store::{CampaignStore, OwnerDirectory, PlacementRegistry, StatsStore};
use chrono::Utc;
use clap::Parser;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

mod seed;

#[derive(Parser, Debug)]
#[command(name = "adboard")]
#[command(about = "Paid-placement marketplace for storefront ad slots")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "ADBOARD__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "ADBOARD__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Pacer sweep interval in seconds (overrides config)
    #[arg(long, env = "ADBOARD__PACER__SWEEP_INTERVAL_SECS")]
    sweep_interval: Option<u64>,

    /// Seed demo placements, campaigns, and wallets at startup
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adboard=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Adboard starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(secs) = cli.sweep_interval {
        config.pacer.sweep_interval_secs = secs;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        sweep_interval_secs = config.pacer.sweep_interval_secs,
        "Configuration loaded"
    );

    // Stores and ledger
    let events = noop_sink();
    let placements = Arc::new(PlacementRegistry::new());
    let campaigns = Arc::new(CampaignStore::new());
    let stats = Arc::new(StatsStore::new());
    let owners = Arc::new(OwnerDirectory::new());
    let ledger = Arc::new(
        WalletLedger::new(events.clone())
            .with_low_balance_threshold(config.ledger.default_low_balance_threshold_cents),
    );

    // Pacer and allocation engine
    let pacer = Arc::new(BudgetPacer::new(
        campaigns.clone(),
        ledger.clone(),
        events.clone(),
    ));
    let decisions = Arc::new(BackgroundDecisionLogger::new(config.decisions.buffer_size));
    let engine = Arc::new(AllocationEngine::new(
        placements.clone(),
        campaigns.clone(),
        ledger.clone(),
        pacer.clone(),
        decisions,
        config.ledger.max_debit_retries,
    ));

    // Insights
    let scorer = Arc::new(HealthScorer::new(
        campaigns.clone(),
        ledger.clone(),
        stats.clone(),
        owners.clone(),
    ));
    let insights = Arc::new(InsightGenerator::new(
        campaigns.clone(),
        ledger.clone(),
        stats.clone(),
        owners.clone(),
    ));

    let creatives = Arc::new(RwLock::new(Vec::new()));

    if cli.seed_demo {
        seed::seed_demo_data(&placements, &campaigns, &ledger, &stats, &owners, &creatives)?;
        pacer.sweep(Utc::now());
        info!("Demo data seeded");
    }

    // Periodic campaign status sweep
    let sweep_pacer = pacer.clone();
    let sweep_secs = config.pacer.sweep_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(sweep_secs));
        loop {
            interval.tick().await;
            sweep_pacer.sweep(Utc::now());
        }
    });

    let state = AppState {
        engine,
        ledger,
        scorer,
        insights,
        creatives,
        node_id: config.node_id.clone(),
        start_time: Instant::now(),
    };

    let api_server = ApiServer::new(config, state);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Adboard is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
