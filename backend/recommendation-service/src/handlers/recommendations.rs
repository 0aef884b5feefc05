//! Recommendation API handlers

use actix_web::cookie::{time::Duration as CookieDuration, Cookie};
use actix_web::{post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::handlers::AppState;
use crate::middleware::MaybeUserId;
use crate::models::{
    PaginationMetadata, RecommendationFilters, RecommendationRequest, ScoredJobPost,
    SearchMetadata,
};

pub(crate) const SESSION_COOKIE: &str = "session_id";
pub(crate) const SESSION_HEADER: &str = "X-Session-Id";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationBody {
    #[validate(length(min = 1, message = "jobTitle is required"))]
    pub job_title: String,
    #[validate(length(min = 1, max = 50, message = "skills must contain between 1 and 50 entries"))]
    pub skills: Vec<String>,
    pub filters: Option<RecommendationFilters>,
    #[serde(default = "default_exclude_viewed")]
    pub exclude_viewed: bool,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_exclude_viewed() -> bool {
    true
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Serialize)]
struct RecommendationData {
    recommendations: Vec<ScoredJobPost>,
    total_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_jobs_count: Option<i64>,
    search_metadata: SearchMetadata,
    pagination: PaginationMetadata,
    personalization_applied: bool,
}

#[derive(Debug, Serialize)]
struct RecommendationEnvelope {
    success: bool,
    data: RecommendationData,
}

/// Session correlation: cookie first, then header, else a fresh id that is
/// returned to the client via cookie.
pub(crate) fn resolve_session_id(req: &HttpRequest) -> (String, bool) {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return (cookie.value().to_string(), false);
    }
    if let Some(header) = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        if !header.is_empty() {
            return (header.to_string(), false);
        }
    }
    (Uuid::new_v4().to_string(), true)
}

pub(crate) fn total_pages(total: i64, page_size: usize) -> usize {
    let total = total.max(0) as usize;
    total.div_ceil(page_size.max(1))
}

/// POST /api/v1/recommendations
/// Generate scored, paginated job recommendations for an optionally
/// authenticated caller.
#[post("/recommendations")]
pub async fn generate_recommendations(
    req: HttpRequest,
    identity: MaybeUserId,
    body: web::Json<RecommendationBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let (session_id, issue_cookie) = resolve_session_id(&req);

    let request = RecommendationRequest {
        job_title: body.job_title.clone(),
        skills: body.skills.clone(),
        user_id: identity.0,
        session_id: Some(session_id.clone()),
        filters: body.filters.clone(),
        exclude_viewed: body.exclude_viewed,
        page: body.page,
        page_size: body.page_size,
    };

    let outcome = state.service.generate_recommendations(request).await?;

    // Fire-and-forget: fold a successful authenticated search into the
    // stored profile. Failures are logged and never reach the caller.
    if let Some(user_id) = identity.0 {
        let service = Arc::clone(&state.service);
        let job_title = body.job_title.clone();
        let skills = body.skills.clone();
        tokio::spawn(async move {
            if let Err(e) = service
                .update_user_profile(user_id, &job_title, &skills)
                .await
            {
                warn!(user_id = %user_id, "Failed to update user profile: {}", e);
            }
        });
    }

    let pages = total_pages(outcome.new_jobs_count, body.page_size);
    let pagination = PaginationMetadata {
        current_page: body.page,
        page_size: body.page_size,
        total_pages: pages,
        has_next: body.page < pages,
        has_previous: body.page > 1,
    };

    let total_count = if outcome.metadata.cache_hit {
        outcome.total_count
    } else {
        outcome.new_jobs_count.max(0) as usize
    };

    let envelope = RecommendationEnvelope {
        success: true,
        data: RecommendationData {
            recommendations: outcome.recommendations,
            total_count,
            new_jobs_count: identity.0.is_some().then_some(outcome.new_jobs_count),
            search_metadata: outcome.metadata,
            pagination,
            personalization_applied: identity.0.is_some() && body.exclude_viewed,
        },
    };

    let mut response = HttpResponse::Ok();
    if issue_cookie {
        response.cookie(
            Cookie::build(SESSION_COOKIE, session_id)
                .max_age(CookieDuration::days(1))
                .http_only(true)
                .path("/")
                .finish(),
        );
    }

    Ok(response.json(envelope))
}
