//! User profile handler

use actix_web::{get, web, HttpResponse};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::handlers::AppState;
use crate::middleware::UserId;
use crate::models::UserProfile;

#[derive(Debug, Serialize)]
struct ProfileEnvelope {
    success: bool,
    data: UserProfile,
}

/// GET /api/v1/profile
/// Return the caller's stored preference profile.
#[get("/profile")]
pub async fn get_user_profile(
    user: UserId,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let profile = state
        .service
        .get_user_profile(user.0)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(HttpResponse::Ok().json(ProfileEnvelope {
        success: true,
        data: profile,
    }))
}
