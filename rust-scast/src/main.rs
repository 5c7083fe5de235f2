use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use rust_scast::api::{ApiServer, AppState};
use rust_scast::config::AppConfig;
use rust_scast::database::{
    self,
    repositories::{SqlxMediaRepository, SqlxPlanRepository, SqlxUsageLedger},
};
use rust_scast::engine::{EncodingEngine, FfmpegEngine};
use rust_scast::events::EventBroadcaster;
use rust_scast::logging;
use rust_scast::session::{SessionController, StreamService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();

    let (logging_handle, _log_guard) = logging::init_logging(&config.logging)?;
    let shutdown = CancellationToken::new();
    logging_handle.start_retention_cleanup(shutdown.child_token());

    info!("rust-scast {} starting", env!("CARGO_PKG_VERSION"));

    // Initialize database
    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let engine = Arc::new(FfmpegEngine::with_config(config.engine.clone()));
    match engine.version() {
        Some(version) => info!("Using {}", version),
        None => warn!(
            "ffmpeg not found at '{}', sessions will fail to launch",
            config.engine.binary_path
        ),
    }

    let events = EventBroadcaster::new();
    let ledger = Arc::new(SqlxUsageLedger::new(pool.clone(), config.usage_reset));
    let controller = SessionController::new(
        engine.clone(),
        ledger.clone(),
        Arc::new(SqlxPlanRepository::new(pool.clone())),
        Arc::new(events.clone()),
        config.session.clone(),
    );
    let service = StreamService::new(
        controller.clone(),
        Arc::new(SqlxMediaRepository::new(pool.clone())),
        ledger,
    );

    let state = AppState::new(service, events)
        .with_engine_version(engine.version())
        .with_logging(logging_handle.clone());
    let server = ApiServer::new(config.api.clone(), state);

    let server_token = server.cancel_token();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
        server_token.cancel();
    });

    let result = server.run().await;

    if controller.stop().await {
        info!("Active session stopped");
    }
    shutdown.cancel();
    pool.close().await;

    result?;
    info!("rust-scast stopped");
    Ok(())
}
