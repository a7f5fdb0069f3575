//! API server lifecycle — bind, spawn the axum server in a background
//! task, return a handle with a shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::core_state::CoreState;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl ApiServer {
    /// Shut down the server gracefully. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Resolve once the server task has exited.
    pub async fn wait(mut self) {
        if let Err(e) = (&mut self.task).await {
            tracing::error!(error = %e, "API server task ended abnormally");
        }
    }
}

/// Bind `addr` (port 0 picks an ephemeral port) and serve the API.
pub async fn start_api_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<ApiServer, String> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;

    let addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get server address: {e}"))?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::config::EngineConfig;
    use crate::db::open_memory_database;
    use crate::notify::TracingSink;

    fn test_core() -> Arc<CoreState> {
        Arc::new(CoreState::new(
            open_memory_database().unwrap(),
            EngineConfig::default(),
            Arc::new(TracingSink),
        ))
    }

    async fn raw_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn localhost() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn serves_health_over_tcp() {
        let mut server = start_api_server(test_core(), localhost())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);

        let response = raw_get(server.addr, "/api/health").await;
        assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
        assert!(response.contains("\"status\":\"ok\""));

        server.shutdown();
        server.wait().await;
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let mut server = start_api_server(test_core(), localhost())
            .await
            .expect("server should start");
        let response = raw_get(server.addr, "/nonexistent").await;
        assert!(response.starts_with("HTTP/1.1 404"), "got: {response}");
        server.shutdown();
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let mut server = start_api_server(test_core(), localhost())
            .await
            .expect("server should start");
        server.shutdown();
        server.shutdown();
        server.wait().await;
    }
}
