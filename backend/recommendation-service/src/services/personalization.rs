//! Personalization engine
//!
//! Applies additive score boosts derived from a user's historical engagement.
//! Personalization is best-effort: when the metrics lookup fails the input
//! jobs are returned unmodified and the degraded path is logged, never
//! surfaced to the caller.

use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::db::JobSearchRepo;
use crate::error::Result;
use crate::models::{EngagementActivity, EngagementMetrics, ScoredJobPost};

const PREFERRED_COMPANY_BOOST: f64 = 5.0;
const TOP_SKILL_BOOST_PER_MATCH: f64 = 2.0;
const TOP_SKILL_BOOST_CAP: f64 = 8.0;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Additive boost for one job against the user's engagement metrics.
/// Always >= 0; zero when no company or skill signal matches.
pub fn compute_boost(job: &ScoredJobPost, metrics: &EngagementMetrics) -> f64 {
    let mut boost = 0.0;

    if metrics
        .preferred_companies
        .iter()
        .any(|company| company.eq_ignore_ascii_case(&job.company_name))
    {
        boost += PREFERRED_COMPANY_BOOST;
    }

    let job_text = format!(
        "{} {}",
        job.title,
        job.description_text.as_deref().unwrap_or("")
    )
    .to_lowercase();
    let matching_top_skills = metrics
        .top_skills
        .iter()
        .filter(|skill| job_text.contains(&skill.to_lowercase()))
        .count();

    if matching_top_skills > 0 {
        boost += (matching_top_skills as f64 * TOP_SKILL_BOOST_PER_MATCH).min(TOP_SKILL_BOOST_CAP);
    }

    boost
}

/// User engagement score in [0, 100]. Pure, no I/O.
///
/// Weighted sum: searches x2 capped 20, views capped 25, saves x2 capped 25,
/// applications x5 capped 20, minutes of average time spent capped 10.
pub fn calculate_engagement_score(activity: &EngagementActivity) -> u32 {
    let mut score = 0.0;

    score += (activity.total_searches as f64 * 2.0).min(20.0);
    score += (activity.total_views as f64).min(25.0);
    score += (activity.total_saves as f64 * 2.0).min(25.0);
    score += (activity.total_applications as f64 * 5.0).min(20.0);
    score += (activity.average_time_spent_secs / 60.0).min(10.0);

    (score.round() as u32).min(100)
}

/// Filters recommended from a user's behavior
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SuggestedFilters {
    pub companies: Vec<String>,
}

pub struct PersonalizationEngine {
    repo: Arc<JobSearchRepo>,
}

impl PersonalizationEngine {
    pub fn new(repo: Arc<JobSearchRepo>) -> Self {
        Self { repo }
    }

    /// Boost each job from the user's engagement metrics, folding the boost
    /// into `relevance_score` and recording it in `personalization_boost`.
    pub async fn apply_personalization_boost(
        &self,
        jobs: Vec<ScoredJobPost>,
        user_id: Uuid,
    ) -> Vec<ScoredJobPost> {
        let metrics = match self.repo.get_user_engagement_metrics(user_id).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    "Personalization boost skipped, returning unboosted results: {}", e
                );
                return jobs;
            }
        };

        jobs.into_iter()
            .map(|mut job| {
                let boost = compute_boost(&job, &metrics);
                job.relevance_score = round2(job.relevance_score + boost);
                job.personalization_boost = boost;
                job
            })
            .collect()
    }

    /// Suggest filters from past behavior (currently the top preferred
    /// companies).
    pub async fn suggest_filters_for_user(&self, user_id: Uuid) -> Result<SuggestedFilters> {
        let metrics = self.repo.get_user_engagement_metrics(user_id).await?;

        Ok(SuggestedFilters {
            companies: metrics.preferred_companies.into_iter().take(5).collect(),
        })
    }
}
