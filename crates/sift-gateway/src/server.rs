use crate::error::ApiError;
use crate::middleware::{identity_middleware, ClientIdentity};
use axum::{
    extract::{rejection::JsonRejection, State},
    middleware as axum_mw,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use sift_core::SiftError;
use sift_memory::Corpus;
use sift_query::QueryOrchestrator;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::warn;

/// `top_k` used when the request body omits it.
pub const DEFAULT_TOP_K: usize = 5;

/// Shared application state.
pub struct AppState {
    /// Query flow behind `POST /search`.
    pub orchestrator: Arc<QueryOrchestrator>,
    /// Corpus reported on by `GET /health`.
    pub corpus: Arc<dyn Corpus>,
}

/// Body of `POST /search`.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub text: String,
    /// Number of results; [`DEFAULT_TOP_K`] when absent.
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Rate-limit partition; falls back to the `x-client-id` header.
    #[serde(default)]
    pub identity: Option<String>,
}

/// The HTTP front door of the search service.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router over an orchestrator and the corpus it searches.
    pub fn build(orchestrator: Arc<QueryOrchestrator>, corpus: Arc<dyn Corpus>) -> Router {
        let state = Arc::new(AppState {
            orchestrator,
            corpus,
        });

        Router::new()
            .route("/health", get(health_handler))
            .route("/search", post(search_handler))
            .with_state(state)
            .layer(ServiceBuilder::new().layer(axum_mw::from_fn(identity_middleware)))
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let documents = match state.corpus.count().await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Corpus count failed");
            return ApiError(SiftError::Corpus(e.to_string())).into_response();
        }
    };
    Json(serde_json::json!({
        "status": "ok",
        "service": "sift",
        "documents": documents,
    }))
    .into_response()
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Extension(client): Extension<ClientIdentity>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) =
        body.map_err(|rejection| SiftError::InvalidInput(rejection.body_text()))?;

    let identity = client.resolve(request.identity.as_deref());
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);

    let response = state
        .orchestrator
        .handle_query(&identity, &request.text, top_k)
        .await?;
    Ok(Json(response).into_response())
}
