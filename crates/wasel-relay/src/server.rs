//! HTTP surface and server lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use wasel_core::OrderId;

use crate::publisher::{self, UpdatePublisher};
use crate::registry::{self, ConnectionRegistry};
use crate::ws;

/// Server configuration.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_send_queue: usize,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 4000,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            client_timeout_secs: 90,
            sweep_interval_secs: 60,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub publisher: UpdatePublisher,
    pub heartbeat: Duration,
    pub started: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Viewer contexts connect to the bare origin, so the upgrade lives at
    // the root; /ws is an alias for tooling.
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/notify/order-status", post(notify_order_status))
        .route("/notify/ui-setting", post(notify_ui_setting))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the relay. Returns a handle to inspect and publish
/// through; dropping the handle stops the background tasks.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(ConnectionRegistry::new(config.max_send_queue));
    let publisher = UpdatePublisher::new(1024);

    let bridge = publisher::create_bridge(Arc::clone(&registry), publisher.subscribe());
    let sweeper = registry::start_sweeper(
        Arc::clone(&registry),
        Duration::from_secs(config.sweep_interval_secs),
        Duration::from_secs(config.client_timeout_secs),
    );

    let state = AppState {
        registry: Arc::clone(&registry),
        publisher: publisher.clone(),
        heartbeat: Duration::from_secs(config.heartbeat_interval_secs),
        started: std::time::Instant::now(),
    };

    let router = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "notification relay started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        registry,
        publisher,
        _server: server,
        _bridge: bridge,
        _sweeper: sweeper,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    pub registry: Arc<ConnectionRegistry>,
    pub publisher: UpdatePublisher,
    _server: tokio::task::JoinHandle<()>,
    _bridge: tokio::task::JoinHandle<()>,
    _sweeper: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(upgrade: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| {
        ws::handle_ws_connection(socket, state.registry, state.heartbeat)
    })
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "connections": state.registry.count(),
        "uptimeSecs": state.started.elapsed().as_secs(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderStatusBody {
    order_id: OrderId,
    message: String,
}

/// Publish endpoint the ordering API calls when an order changes status.
async fn notify_order_status(
    State(state): State<AppState>,
    Json(body): Json<OrderStatusBody>,
) -> impl IntoResponse {
    state
        .publisher
        .publish_order_status(body.order_id, body.message);
    StatusCode::ACCEPTED
}

/// Publish endpoint for the global UI-settings change signal.
async fn notify_ui_setting(State(state): State<AppState>) -> impl IntoResponse {
    state.publisher.publish_ui_setting();
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0, // random port
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let handle = start(test_config()).await.unwrap();
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn notify_endpoints_accept() {
        let handle = start(test_config()).await.unwrap();
        let client = reqwest::Client::new();

        let resp = client
            .post(format!(
                "http://127.0.0.1:{}/notify/order-status",
                handle.port
            ))
            .json(&serde_json::json!({"orderId": "12345", "message": "في الطريق"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);

        let resp = client
            .post(format!("http://127.0.0.1:{}/notify/ui-setting", handle.port))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
    }

    #[tokio::test]
    async fn notify_order_status_rejects_bad_body() {
        let handle = start(test_config()).await.unwrap();
        let resp = reqwest::Client::new()
            .post(format!(
                "http://127.0.0.1:{}/notify/order-status",
                handle.port
            ))
            .json(&serde_json::json!({"orderId": "12345"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
    }

    #[test]
    fn build_router_creates_routes() {
        let state = AppState {
            registry: Arc::new(ConnectionRegistry::new(32)),
            publisher: UpdatePublisher::new(16),
            heartbeat: Duration::from_secs(30),
            started: std::time::Instant::now(),
        };
        let _router = build_router(state);
    }
}
