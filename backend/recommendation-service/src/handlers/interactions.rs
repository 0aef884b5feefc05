//! Interaction tracking and feedback handlers

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::handlers::recommendations::{SESSION_COOKIE, SESSION_HEADER};
use crate::handlers::AppState;
use crate::middleware::UserId;
use crate::models::{InteractionMetadata, InteractionType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionBody {
    pub job_id: String,
    pub interaction_type: String,
    pub metadata: Option<InteractionMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackBody {
    pub job_id: String,
    pub feedback_type: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageEnvelope {
    success: bool,
    message: String,
}

fn parse_job_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::Validation("jobId must be a valid UUID".to_string()))
}

fn session_id_from(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .map(|h| h.to_string())
}

/// POST /api/v1/interactions
/// Record a user action against a job posting. Requires authentication.
#[post("/interactions")]
pub async fn track_interaction(
    req: HttpRequest,
    user: UserId,
    body: web::Json<InteractionBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let body = body.into_inner();

    let job_id = parse_job_id(&body.job_id)?;
    let interaction_type = InteractionType::parse(&body.interaction_type).ok_or_else(|| {
        AppError::Validation(format!(
            "Invalid interactionType. Must be one of: {}",
            InteractionType::VALID_TYPES.join(", ")
        ))
    })?;

    let session_id = session_id_from(&req);

    state
        .service
        .track_job_interaction(
            user.0,
            job_id,
            interaction_type,
            session_id.as_deref(),
            body.metadata,
        )
        .await?;

    Ok(HttpResponse::Ok().json(MessageEnvelope {
        success: true,
        message: "Interaction tracked successfully".to_string(),
    }))
}

/// POST /api/v1/feedback
/// Record explicit recommendation feedback. Requires authentication.
#[post("/feedback")]
pub async fn submit_feedback(
    user: UserId,
    body: web::Json<FeedbackBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let body = body.into_inner();

    let job_id = parse_job_id(&body.job_id)?;
    if body.feedback_type.trim().is_empty() {
        return Err(AppError::Validation(
            "feedbackType is required".to_string(),
        ));
    }

    state
        .service
        .submit_feedback(user.0, job_id, &body.feedback_type, body.reason)
        .await?;

    Ok(HttpResponse::Ok().json(MessageEnvelope {
        success: true,
        message: "Feedback submitted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_id() {
        assert!(parse_job_id("not-a-uuid").is_err());
        assert!(parse_job_id("4b8c7a8e-9f5e-4d2a-b1c3-2f6a8e9d0c1b").is_ok());
    }

    #[test]
    fn test_interaction_body_wire_format() {
        let body: InteractionBody = serde_json::from_str(
            r#"{"jobId":"4b8c7a8e-9f5e-4d2a-b1c3-2f6a8e9d0c1b","interactionType":"saved","metadata":{"timeSpent":30}}"#,
        )
        .unwrap();
        assert_eq!(body.interaction_type, "saved");
        assert_eq!(body.metadata.unwrap().time_spent, Some(30.0));
    }
}
