use axum::{middleware, routing::any, Router};
use kb_core::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

pub mod auth;
pub mod handlers;
pub mod state;

pub use state::AppState;

/// Strip the `/api` mount point, leaving the backend-relative path.
pub fn api_path(path: &str) -> &str {
    match path.strip_prefix("/api") {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// The fixture backend over HTTP, mounted under `/api`.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/*rest", any(handlers::dispatch))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("🚀 Mock backend listening on http://{}/api", listener.local_addr()?);
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("🛑 Shutting down");
        })
        .await?;
    Ok(())
}

/// Bind `addr` (port 0 for an ephemeral one) and serve in the background.
pub async fn spawn(addr: SocketAddr, state: AppState) -> Result<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let app = create_app(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Mock backend stopped: {}", e);
        }
    });
    info!("🚀 Mock backend listening on http://{}/api", local);
    Ok(local)
}

pub mod prelude {
    pub use super::{create_app, serve, spawn, AppState};
    pub use kb_transport::{MockConfig, MockStore};
}
