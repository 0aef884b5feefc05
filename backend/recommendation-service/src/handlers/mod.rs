pub mod interactions;
pub mod profile;
pub mod recommendations;

use std::sync::Arc;

use crate::services::RecommendationService;

/// Shared handler state
pub struct AppState {
    pub service: Arc<RecommendationService>,
}

pub use interactions::{submit_feedback, track_interaction};
pub use profile::get_user_profile;
pub use recommendations::generate_recommendations;
