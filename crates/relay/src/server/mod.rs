mod auth;
mod routes;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{config::Config, sinks::MessageSender, Result};

pub use auth::authorize;
pub use routes::{compose_response, WebhookQuery};

/// Request-independent state shared by every webhook call. Built once at startup and
/// never mutated.
pub struct Server {
    path: String,
    webhook_token: String,
    chat_ids: Vec<String>,
    sender: Arc<dyn MessageSender>,
}

impl Server {
    pub fn new(config: &Config, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            path: config.server.path.clone(),
            webhook_token: config.webhook.token.clone(),
            chat_ids: config.telegram.chat_ids.clone(),
            sender,
        }
    }

    pub fn build_router(self) -> Router {
        let path = self.path.clone();
        let state = Arc::new(self);

        Router::new()
            .route(
                &path,
                post(routes::webhook).fallback(routes::method_not_allowed),
            )
            .fallback(routes::fallback)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(DefaultBodyLimit::disable()),
            )
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}
