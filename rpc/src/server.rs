//! Axum-based RPC server.

use crate::error::RpcError;
use crate::handlers;

use axum::routing::{delete, get, post};
use axum::Router;
use carbon_verification::VerificationCoordinator;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the API router around `coordinator`.
pub fn router(coordinator: VerificationCoordinator) -> Router {
    Router::new()
        .route("/verify", post(handlers::verify))
        .route("/credits/:id", get(handlers::credit_status))
        .route("/credits/:id/wave", delete(handlers::cancel_wave))
        .route("/stats", get(handlers::stats))
        .with_state(coordinator)
}

pub struct RpcServer {
    pub port: u16,
    coordinator: VerificationCoordinator,
}

impl RpcServer {
    pub fn new(port: u16, coordinator: VerificationCoordinator) -> Self {
        Self { port, coordinator }
    }

    /// Bind the listening socket. Port 0 picks a free port.
    pub async fn bind(&self) -> Result<TcpListener, RpcError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "RPC server listening");
        Ok(listener)
    }

    /// Serve requests on `listener` until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        axum::serve(listener, router(self.coordinator))
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("RPC server stopped");
        Ok(())
    }

    /// Bind and serve in one step.
    pub async fn start(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }
}
