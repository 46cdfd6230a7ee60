//! REST API endpoints for diagnosis explanations and follow-up chat

use std::collections::BTreeMap;

use actix_web::{HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ErrorResponse};
use crate::app::AppState;
use crate::model::{Diagnosis, DiagnosisLabel, PatientContext, ValidationError};

/// Request body for an initial explanation
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExplainRequest {
    /// Classifier label (NORM, MI, STTC, CD, HYP); other labels are explained generically
    pub diagnosis: String,
    /// Classifier confidence in [0, 1] (default: 1.0)
    pub confidence: Option<f64>,
    /// Per-category probabilities, expected to sum to 1
    pub probabilities: Option<BTreeMap<String, f64>>,
    pub age: Option<u32>,
    /// "male" or "female", case-insensitive
    pub sex: Option<String>,
}

impl ExplainRequest {
    fn into_domain(self) -> Result<(Diagnosis, PatientContext), ValidationError> {
        let label = DiagnosisLabel::parse(&self.diagnosis)?;
        let mut diagnosis = Diagnosis::new(label, self.confidence.unwrap_or(1.0))?;
        if let Some(probabilities) = self.probabilities {
            diagnosis = diagnosis.with_probabilities(probabilities)?;
        }
        let patient = PatientContext::parse(self.age, self.sex.as_deref())?;
        Ok((diagnosis, patient))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExplainResponse {
    pub text: String,
    /// Number of reference chunks used to ground the explanation
    pub rag_sources: usize,
    /// True when the canned explanation was returned
    pub fallback: bool,
}

/// Request body for a chat turn
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// Existing session id; a new session is started when absent or unknown
    pub session_id: Option<String>,
    pub message: String,
    pub diagnosis: String,
    pub age: Option<u32>,
    pub sex: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub session_id: String,
    pub text: String,
}

/// Explain an ECG diagnosis in patient-friendly language
#[utoipa::path(
    post,
    path = "/v1/explanations",
    request_body = ExplainRequest,
    responses(
        (status = 200, description = "Explanation generated", body = ExplainResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "explanations"
)]
#[post("/v1/explanations")]
pub async fn explain(
    state: web::Data<AppState>,
    body: web::Json<ExplainRequest>,
) -> Result<HttpResponse, ApiError> {
    let (diagnosis, patient) = body.into_inner().into_domain()?;

    tracing::info!(
        diagnosis = %diagnosis.label(),
        confidence = diagnosis.confidence(),
        probabilities = ?diagnosis.probabilities(),
        has_age = patient.age().is_some(),
        has_sex = patient.sex().is_some(),
        "Explanation requested"
    );

    let result = state.generator.generate(&diagnosis, &patient).await;

    Ok(HttpResponse::Ok().json(ExplainResponse {
        text: result.text,
        rag_sources: result.rag_sources,
        fallback: result.fallback,
    }))
}

/// Ask a follow-up question about an ECG result
#[utoipa::path(
    post,
    path = "/v1/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "chat"
)]
#[post("/v1/chat")]
pub async fn chat(
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();

    if request.message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage.into());
    }
    let diagnosis = Diagnosis::new(DiagnosisLabel::parse(&request.diagnosis)?, 1.0)?;
    let patient = PatientContext::parse(request.age, request.sex.as_deref())?;

    let (session_id, session) = state.sessions.get_or_create(request.session_id.as_deref());
    let mut session = session.lock().await;

    let text = state
        .session_handler
        .ask(&mut session, &request.message, &diagnosis, &patient)
        .await;

    Ok(HttpResponse::Ok().json(ChatResponse { session_id, text }))
}

/// Map malformed JSON bodies onto the standard error response
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

/// Configure explanation and chat routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(explain).service(chat);
}
