pub mod personalization;
pub mod recommendation;

pub use personalization::{
    calculate_engagement_score, compute_boost, PersonalizationEngine, SuggestedFilters,
};
pub use recommendation::{RecommendationService, ALGORITHM_VERSION};
