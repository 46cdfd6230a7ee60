//! OpenAPI specification endpoints

use actix_web::{HttpResponse, Responder, get};
use utoipa::OpenApi;

use crate::api::error::ErrorResponse;
use crate::api::explain::{ChatRequest, ChatResponse, ExplainRequest, ExplainResponse};
use crate::api::health::{DependencyHealth, HealthStatus, ReadinessStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HeartSight Explainer",
        description = "Grounded, guarded explanations of ECG diagnoses"
    ),
    paths(
        crate::api::explain::explain,
        crate::api::explain::chat,
        crate::api::health::liveness,
        crate::api::health::readiness,
    ),
    components(schemas(
        ExplainRequest,
        ExplainResponse,
        ChatRequest,
        ChatResponse,
        ErrorResponse,
        HealthStatus,
        ReadinessStatus,
        DependencyHealth,
    )),
    tags(
        (name = "explanations", description = "Diagnosis explanations"),
        (name = "chat", description = "Follow-up conversations"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => HttpResponse::Ok().content_type("text/yaml").body(yaml),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render OpenAPI YAML");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/v1/explanations", "/v1/chat", "/health/live", "/health/ready"] {
            assert!(doc.paths.paths.contains_key(path), "{}", path);
        }
    }
}
