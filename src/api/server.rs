//! Portal server lifecycle.
//!
//! bind → spawn background task → return handle with shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::api::router::portal_router;
use crate::core_state::CoreState;

/// Metadata for a running portal server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSession {
    pub session_id: String,
    pub server_addr: String,
    pub port: u16,
    pub started_at: String,
}

/// Handle to a running portal server.
pub struct PortalServer {
    pub session: ServerSession,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PortalServer {
    /// Signal graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Portal server shutdown signal sent");
        }
    }

    /// Wait for the server task to finish after `shutdown`.
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Portal server task failed: {e}");
            }
        }
    }
}

/// Bind `addr` (port 0 for ephemeral), mount the portal router, and serve it
/// in a background task.
pub async fn start_server_on(
    core: Arc<CoreState>,
    addr: SocketAddr,
    cors_origin: &str,
) -> Result<PortalServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind portal server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = portal_router(core.clone(), cors_origin);

    let session = ServerSession {
        session_id: Uuid::new_v4().to_string(),
        server_addr: addr.to_string(),
        port: addr.port(),
        started_at: chrono::Utc::now().to_rfc3339(),
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Portal server received shutdown signal");
        };

        tracing::info!(%addr, "Portal server started");

        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await
        {
            tracing::error!("Portal server error: {e}");
        }

        if let Err(e) = core.flush_and_prune_audit() {
            tracing::warn!("Final audit flush failed: {e}");
        }
        tracing::info!("Portal server stopped");
    });

    Ok(PortalServer {
        session,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use crate::db;
    use crate::prediction::mock::MockPredictor;

    fn test_core() -> (tempfile::TempDir, Arc<CoreState>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.db");
        db::open_database(&path).unwrap();
        let core = CoreState::new(path, Arc::new(MockPredictor::replying("a", "b")))
            .with_password_iterations(1_000);
        (dir, Arc::new(core))
    }

    fn localhost() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let (_dir, core) = test_core();
        let mut server = start_server_on(core, localhost(), "*")
            .await
            .expect("server should start");

        assert!(!server.session.session_id.is_empty());
        assert!(server.session.port > 0);

        let url = format!("http://127.0.0.1:{}/api/health", server.session.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        drop(resp);

        server.shutdown();
        server.stopped().await;
    }

    #[tokio::test]
    async fn protected_route_over_http_needs_token() {
        let (_dir, core) = test_core();
        let mut server = start_server_on(core, localhost(), "*")
            .await
            .expect("server should start");

        let port = server.session.port;
        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/patients"))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/nonexistent"))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        drop(resp);

        server.shutdown();
        server.stopped().await;
    }

    #[tokio::test]
    async fn shutdown_flushes_audit_log() {
        let (_dir, core) = test_core();
        let mut server = start_server_on(core.clone(), localhost(), "*")
            .await
            .expect("server should start");

        let url = format!("http://127.0.0.1:{}/api/health", server.session.port);
        reqwest::get(&url).await.unwrap();

        server.shutdown();
        server.stopped().await;

        let conn = core.open_db().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let (_dir, core) = test_core();
        let mut server = start_server_on(core, localhost(), "*")
            .await
            .expect("server should start");

        server.shutdown();
        server.shutdown();
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let (_dir, core) = test_core();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        assert!(start_server_on(core, addr, "*").await.is_err());
    }
}
