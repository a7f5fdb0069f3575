pub mod api;
pub mod availability;
pub mod calendar;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod reminders;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::core_state::CoreState;
use crate::notify::{MessageSink, TracingSink};
use crate::reminders::SinkDispatcher;

/// Start the engine: open the database, run the reminder worker and serve
/// the HTTP API until Ctrl-C.
pub async fn run() -> Result<(), String> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = EngineConfig::from_env().map_err(|e| e.to_string())?;
    let conn = db::open_database(&config.database_path)
        .map_err(|e| format!("Cannot open {}: {e}", config.database_path.display()))?;
    tracing::info!(path = %config.database_path.display(), "Database ready");

    let sink: Arc<dyn MessageSink> = Arc::new(TracingSink);
    let core = Arc::new(CoreState::new(conn, config.clone(), sink.clone()));

    let worker = reminders::start_reminder_worker(
        core.clone(),
        Arc::new(SinkDispatcher::new(sink)),
        config.reminder_poll_interval(),
    );
    let mut server = api::start_api_server(core, config.bind_addr).await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Cannot listen for shutdown signal: {e}"))?;
    tracing::info!("Shutdown requested");

    server.shutdown();
    server.wait().await;
    worker.stop().await;
    Ok(())
}
