use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};

use crate::{
    config::ServiceConfig,
    middleware::{log_requests, rate_limit},
    rate_limit::RateLimiter,
};
use sshxfer_transfer::transfer::{
    Connector, TransferOrchestrator, TransferRequest, TransferStatusReport,
};

// ── Error body ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

// ── Service ──────────────────────────────────────────────────────────────────

pub struct ApiService {
    pub orchestrator: Arc<TransferOrchestrator>,
    pub limiter: Arc<RateLimiter>,
    pub config: ServiceConfig,
}

impl ApiService {
    pub fn new(config: ServiceConfig, connector: Arc<dyn Connector>) -> Self {
        let orchestrator = TransferOrchestrator::new(
            connector,
            config.credential_defaults(),
            config.session_factory(),
        );
        let limiter = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window());
        Self {
            orchestrator: Arc::new(orchestrator),
            limiter: Arc::new(limiter),
            config,
        }
    }

    pub async fn start_server(self: Arc<Self>) -> std::io::Result<()> {
        let addr = self.config.socket_addr();
        let app = self.create_router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("SSH file transfer API listening on http://{}", addr);
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("SSH file transfer API stopped");
        Ok(())
    }

    pub fn create_router(self: Arc<Self>) -> Router {
        // Transfers stream for as long as they need; only the cheap routes
        // get a response deadline.
        let mut quick = Router::new()
            .route("/health", get(health_check))
            .route("/api/v1/transfers/:id", get(get_transfer_status));
        if let Some(timeout) = self.config.write_timeout() {
            quick = quick.route_layer(TimeoutLayer::new(timeout));
        }

        let mut router = Router::new()
            .route("/api/v1/transfers", post(create_transfer))
            .merge(quick)
            .layer(DefaultBodyLimit::max(self.config.max_request_size));
        if let Some(timeout) = self.config.read_timeout() {
            router = router.layer(RequestBodyTimeoutLayer::new(timeout));
        }

        router
            .layer(middleware::from_fn_with_state(self.limiter.clone(), rate_limit))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn(log_requests))
            .with_state(self)
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn create_transfer(
    State(services): State<Arc<ApiService>>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return ApiError::new(status, "Invalid request payload")
                .with_details(rejection.body_text())
                .into_response();
        }
    };

    if let Err(e) = request.validate() {
        return ApiError::new(StatusCode::BAD_REQUEST, "Invalid request payload")
            .with_details(e.to_string())
            .into_response();
    }

    let orchestrator = services.orchestrator.clone();
    match tokio::task::spawn_blocking(move || orchestrator.transfer(&request)).await {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(failure)) => (StatusCode::INTERNAL_SERVER_ERROR, Json(failure.result)).into_response(),
        Err(e) => {
            tracing::error!("Transfer task did not complete: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to transfer file")
                .with_details(e.to_string())
                .into_response()
        }
    }
}

// No transfer history is kept; the report is always synthetic.
async fn get_transfer_status(Path(id): Path<String>) -> Json<TransferStatusReport> {
    Json(TransferStatusReport::synthetic(id))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> axum::http::Response<Body> {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!("Handler panicked: {}", details);
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        .with_details(details)
        .into_response()
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
    tracing::info!("Shutdown signal received, draining connections");
}
