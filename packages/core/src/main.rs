use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;

use toolroom_custody::api::{self, AppState};
use toolroom_custody::cli::Cli;
use toolroom_custody::clock::{Clock, SystemClock};
use toolroom_custody::config::Config;
use toolroom_custody::custody::CustodyService;
use toolroom_custody::db::create_pool;
use toolroom_custody::error::AppError;
use toolroom_custody::logging::init_logging;
use toolroom_custody::metrics::AppMetrics;
use toolroom_custody::repository::ToolroomRepository;
use toolroom_custody::rules::{RulesConfig, RulesEngine};
use toolroom_custody::scheduler::run_rules_scheduler;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    if let Err(err) = run().await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = Config::from_env()
        .and_then(|config| config.with_cli(&cli))
        .map_err(AppError::Config)?;

    tracing::info!(
        "Service starting (port {}, overdue every {}s, calibration every {}s, default node {})",
        config.api_port,
        config.overdue_interval_seconds,
        config.calibration_interval_seconds,
        config.default_edge_node
    );

    let pool = create_pool(&config.database_url).await?;
    let repo = ToolroomRepository::new(pool);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics = Arc::new(AppMetrics::new()?);

    let service = CustodyService::new(
        repo.clone(),
        Arc::new(repo.clone()),
        clock.clone(),
        config.default_edge_node.clone(),
    );
    let engine = RulesEngine::new(repo.clone(), clock.clone(), RulesConfig::default());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_rules_scheduler(
        engine.clone(),
        metrics.clone(),
        config.scheduler(),
        shutdown_rx.clone(),
    ));

    let app = api::create_router(Arc::new(AppState {
        service,
        engine,
        repo,
        clock,
        metrics,
    }));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("API listening on {}", addr);

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    if let Err(err) = scheduler.await {
        tracing::error!("Rules scheduler task failed: {}", err);
    }
    tracing::info!("Service stopped cleanly");
    Ok(())
}
