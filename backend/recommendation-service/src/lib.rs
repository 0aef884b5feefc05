pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use cache::{ResultCache, SweeperHandle};
pub use config::Config;
pub use error::{AppError, Result};

// Re-export recommendation engine components
pub use services::{
    calculate_engagement_score, compute_boost, PersonalizationEngine, RecommendationService,
    ALGORITHM_VERSION,
};
