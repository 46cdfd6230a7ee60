//! Health check endpoints for Kubernetes liveness and readiness checks

use std::collections::BTreeMap;

use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessStatus {
    pub status: String,
    pub version: String,
    pub dependencies: DependencyHealth,
    /// Guardrail events seen since startup, keyed by `stage/rule`
    pub guardrail_events: BTreeMap<String, u64>,
}

#[derive(Serialize, ToSchema)]
pub struct DependencyHealth {
    /// "loaded", "empty" or "unknown"
    pub corpus: String,
    pub corpus_chunks: Option<usize>,
    pub active_sessions: usize,
}

/// Liveness check endpoint
///
/// Always returns 200 OK if the service is running.
#[utoipa::path(
    get,
    path = "/health/live",
    responses(
        (status = 200, description = "Service is alive", body = HealthStatus)
    ),
    tag = "health"
)]
#[get("/health/live")]
pub async fn liveness() -> impl Responder {
    HttpResponse::Ok().json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check endpoint
///
/// The service answers in degraded mode without a corpus, so an empty index is
/// reported but does not make the pod unready.
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessStatus)
    ),
    tag = "health"
)]
#[get("/health/ready")]
pub async fn readiness(state: web::Data<AppState>) -> impl Responder {
    let corpus_chunks = state.index.len_hint();
    let corpus = match corpus_chunks {
        Some(0) => "empty",
        Some(_) => "loaded",
        None => "unknown",
    };

    HttpResponse::Ok().json(ReadinessStatus {
        status: "ready".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies: DependencyHealth {
            corpus: corpus.to_string(),
            corpus_chunks,
            active_sessions: state.sessions.len(),
        },
        guardrail_events: state.sink.counters(),
    })
}

/// Configure health check routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(liveness).service(readiness);
}
