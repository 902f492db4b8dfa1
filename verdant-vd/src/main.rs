//! verdant-vd — Venue Discovery review service
//!
//! Startup order: resolve root folder, open the database, load config,
//! start the staleness sweep, then serve HTTP until ctrl-c.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;
use verdant_common::config::{ensure_root_folder, resolve_root_folder};
use verdant_common::events::EventBus;

use verdant_vd::config::ServiceConfig;
use verdant_vd::{build_router, db, sweep, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli_root = std::env::args().nth(1);
    let root_folder = resolve_root_folder(cli_root.as_deref(), "VERDANT_VD_ROOT");
    let db_path = ensure_root_folder(&root_folder)?;
    info!("Root folder: {}", root_folder.display());

    let pool = db::init_database_pool(&db_path).await?;
    let config = ServiceConfig::load(&root_folder);
    let port = config.port;

    let event_bus = EventBus::new(1000);
    let state = AppState::new(pool.clone(), event_bus.clone(), config);

    sweep::spawn_staleness_sweep(
        pool,
        event_bus,
        state.config.stale_after_days,
        state.config.sweep_interval_minutes,
        state.shutdown.clone(),
    );

    let app = build_router(state.clone());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("verdant-vd listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
    state.shutdown.cancel();
}
