pub mod api;
pub mod auth;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod models;
pub mod patients;
pub mod prediction;
pub mod therapy;
pub mod validation;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::PortalConfig;
use crate::core_state::CoreState;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Serve the portal until Ctrl-C or SIGTERM.
pub async fn run(config: PortalConfig) -> Result<(), String> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let core = CoreState::from_config(&config).map_err(|e| e.to_string())?;
    let mut server =
        api::start_server_on(Arc::new(core), config.bind_addr, &config.cors_origin).await?;
    tracing::info!(
        addr = %server.session.server_addr,
        prediction_url = %config.prediction_url,
        "Portal listening"
    );

    shutdown_signal().await;

    server.shutdown();
    server.stopped().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl-C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
