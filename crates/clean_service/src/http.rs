use crate::metrics::Metrics;
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use compactness::{CompactnessFilter, Feature, TransverseMercator};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub filter: CompactnessFilter<TransverseMercator>,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    pub features: Vec<Feature>,
    #[serde(default)]
    pub k_threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CleanResponse {
    pub ids_to_hide: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidBody(#[from] JsonRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidBody(rejection) => {
                let body = Json(serde_json::json!({ "detail": rejection.body_text() }));
                (rejection.status(), body).into_response()
            }
        }
    }
}

pub fn router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/clean", post(clean))
        .route("/healthz", get(|| async { "ok" }))
        .layer(cors)
        .with_state(state)
}

/// Any origin is mirrored back when `allowed_origins` is empty; credentials are always allowed.
pub fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin '{o}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

async fn clean(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CleanRequest>, JsonRejection>,
) -> Result<Json<CleanResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        state.metrics.requests_rejected_total.inc();
        tracing::info!(error = %rejection, "Rejected clean request");
        ApiError::from(rejection)
    })?;

    let started = Instant::now();
    let outcome = state.filter.clean(&req.features, req.k_threshold);
    let elapsed = started.elapsed();
    state.metrics.record(&outcome, elapsed);

    tracing::info!(
        features = req.features.len(),
        hidden = outcome.ids_to_hide.len(),
        invalid = outcome.invalid,
        undefined = outcome.undefined,
        k_threshold = req.k_threshold.unwrap_or(state.filter.default_threshold()),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Processed clean request"
    );

    Ok(Json(CleanResponse {
        ids_to_hide: outcome.ids_to_hide,
    }))
}
