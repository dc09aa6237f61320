//! Server setup and initialization

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use club_common::{AppError, ServerConfig};
use tokio::net::TcpListener;
use tracing::info;

use crate::middleware::apply_middleware;
use crate::routes::create_router;
use crate::state::AppState;
use crate::store::InMemoryChannelStore;

/// Build the complete Axum application with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    apply_middleware(create_router()).with_state(state)
}

/// Serve `app` on an already bound listener
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), AppError> {
    let addr = listener.local_addr().map_err(AppError::internal)?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::internal(anyhow::anyhow!("server error: {e}")))
}

/// Bind and run the server with an empty store
pub async fn run(config: ServerConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .address()
        .parse()
        .map_err(|e| AppError::InvalidInput(format!("bad listen address {}: {e}", config.address())))?;

    let state = AppState::new(Arc::new(InMemoryChannelStore::new()));
    let app = create_app(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(anyhow::anyhow!("failed to bind to {addr}: {e}")))?;

    run_server(app, listener).await
}
