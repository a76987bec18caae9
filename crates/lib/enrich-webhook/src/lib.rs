//! HTTP webhook server for enrich-hook.
//!
//! Accepts document events on `POST /`, runs the enrichment pipeline, and
//! maps its outcome onto a status code. Error detail is logged by the
//! pipeline and never echoed back to the caller.

use std::net::SocketAddr;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use enrich_core::control::{EnrichmentPipeline, PipelineError, PipelineOutcome};
use enrich_store::schema::STATUS_OK;
use serde::Serialize;
use tracing::info;

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Configuration for the webhook HTTP server.
#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
}

impl WebhookServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 8080)))
    }
}

/// HTTP webhook server wrapper.
pub struct WebhookServer {
    config: WebhookServerConfig,
    state: AppState,
}

impl WebhookServer {
    #[must_use]
    pub const fn new(pipeline: EnrichmentPipeline, config: WebhookServerConfig) -> Self {
        Self {
            config,
            state: AppState { pipeline },
        }
    }

    /// Builds the router without binding a listener.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.max_body_bytes)
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = self.router();

        info!("enrich-webhook listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    pipeline: EnrichmentPipeline,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    const fn bad_request(message: &'static str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    const fn internal(message: &'static str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MalformedEvent(_) => Self::bad_request("Bad Request: Invalid payload"),
            PipelineError::StoreRead(_) => Self::internal("Document store read error"),
            PipelineError::LabelService(_) => Self::internal("Label service error"),
            PipelineError::CaptionService(_) => Self::internal("Caption service error"),
            PipelineError::StoreWrite(_) => Self::internal("Document store update error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", post(handle_event))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_event(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let outcome = state.pipeline.run(&body).await?;
    let response = match outcome {
        PipelineOutcome::Enriched(_) => Json(StatusResponse { status: STATUS_OK }).into_response(),
        PipelineOutcome::DocumentMissing(_) => (StatusCode::OK, "Document not found").into_response(),
        PipelineOutcome::ImageMissing(_) => (StatusCode::OK, "Missing imageUrl").into_response(),
    };
    Ok(response)
}
