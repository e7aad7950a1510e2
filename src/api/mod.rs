pub mod auth;
pub mod error;
pub mod events;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod types;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::db::Database;

pub use auth::generate_token;
pub use error::{ApiError, ApiResult, AppError, ErrorCode};
pub use state::{AppState, LiveEvent};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: IpAddr,
    pub port: u16,
    pub token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 7480,
            token: generate_token(),
        }
    }
}

/// Server handle for managing the running server
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub shutdown_tx: oneshot::Sender<()>,
    pub join: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Signals graceful shutdown and waits for in-flight requests to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join.await {
            tracing::error!("API server task failed: {}", e);
        }
    }
}

/// Start the API server
pub async fn start_server(db: Arc<Database>, config: ApiConfig) -> anyhow::Result<ServerHandle> {
    let state = AppState::new(db, config.token.clone());
    let router = routes::create_router(state);

    let addr = SocketAddr::new(config.host, config.port);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("API server listening on http://{}", actual_addr);

    let join = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
                tracing::info!("API server shutting down");
            })
            .await;
        if let Err(e) = result {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr: actual_addr,
        shutdown_tx,
        join,
    })
}
