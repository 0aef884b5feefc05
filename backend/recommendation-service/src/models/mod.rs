//! Domain types for the job recommendation engine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracked user action against a job posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Viewed,
    Saved,
    Dismissed,
    ClickedApply,
    Shared,
    Reported,
}

impl InteractionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Viewed => "viewed",
            Self::Saved => "saved",
            Self::Dismissed => "dismissed",
            Self::ClickedApply => "clicked_apply",
            Self::Shared => "shared",
            Self::Reported => "reported",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "viewed" => Some(Self::Viewed),
            "saved" => Some(Self::Saved),
            "dismissed" => Some(Self::Dismissed),
            "clicked_apply" => Some(Self::ClickedApply),
            "shared" => Some(Self::Shared),
            "reported" => Some(Self::Reported),
            _ => None,
        }
    }

    /// High-signal events change future personalized/exclusion-based results
    /// and therefore force cache invalidation.
    pub fn is_high_signal(&self) -> bool {
        matches!(self, Self::Saved | Self::Dismissed | Self::ClickedApply)
    }

    pub const VALID_TYPES: [&'static str; 6] = [
        "viewed",
        "saved",
        "dismissed",
        "clicked_apply",
        "shared",
        "reported",
    ];
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional client-side measurements attached to an interaction.
/// Keys stay camelCase on the wire and in JSONB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_depth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_within_days: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_companies: Option<Vec<String>>,
}

/// Internal request passed from the HTTP boundary to the service
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub job_title: String,
    pub skills: Vec<String>,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub filters: Option<RecommendationFilters>,
    pub exclude_viewed: bool,
    pub page: usize,
    pub page_size: usize,
}

/// Request-scoped, scored view of a posting. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredJobPost {
    pub id: Uuid,
    pub title: String,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_info: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub relevance_score: f64,
    pub match_reasons: Vec<String>,
    pub skill_match_count: usize,
    pub title_similarity: f64,
    pub personalization_boost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_viewed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_saved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_count: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub user_job_title: String,
    pub user_skills: Vec<String>,
    pub algorithm_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters_applied: Option<RecommendationFilters>,
    pub execution_time_ms: u64,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalization_factors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMetadata {
    pub current_page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Mutable preference snapshot, merged (never overwritten) on upsert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub desired_job_title: Option<String>,
    pub skills: Vec<String>,
    pub experience_level: Option<String>,
    pub preferred_locations: Vec<String>,
    pub preferred_employment_types: Vec<String>,
    pub excluded_companies: Vec<String>,
    pub preferences: Option<serde_json::Value>,
}

/// Partial profile update: absent fields keep their stored value
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub desired_job_title: Option<String>,
    pub skills: Option<Vec<String>>,
    pub experience_level: Option<String>,
    pub preferred_locations: Option<Vec<String>>,
    pub preferred_employment_types: Option<Vec<String>>,
    pub excluded_companies: Option<Vec<String>>,
    pub preferences: Option<serde_json::Value>,
}

/// Aggregated 90-day engagement signals backing personalization
#[derive(Debug, Clone, Default)]
pub struct EngagementMetrics {
    pub top_skills: Vec<String>,
    pub preferred_companies: Vec<String>,
    pub avg_interaction_time: f64,
}

/// Raw activity counts for the engagement score
#[derive(Debug, Clone, Default)]
pub struct EngagementActivity {
    pub total_searches: u32,
    pub total_views: u32,
    pub total_saves: u32,
    pub total_applications: u32,
    pub average_time_spent_secs: f64,
}

/// Per-job interaction state for a single user
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionState {
    pub is_viewed: bool,
    pub is_saved: bool,
    pub count: i64,
}

/// Result of a recommendation run, pre-HTTP-envelope
#[derive(Debug, Clone)]
pub struct RecommendationOutcome {
    pub recommendations: Vec<ScoredJobPost>,
    pub metadata: SearchMetadata,
    /// Length of the full scored list before pagination
    pub total_count: usize,
    pub new_jobs_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_type_round_trip() {
        for raw in InteractionType::VALID_TYPES {
            let parsed = InteractionType::parse(raw).unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
        assert!(InteractionType::parse("feedback_thumbs_up").is_none());
    }

    #[test]
    fn test_high_signal_types() {
        assert!(InteractionType::Saved.is_high_signal());
        assert!(InteractionType::Dismissed.is_high_signal());
        assert!(InteractionType::ClickedApply.is_high_signal());
        assert!(!InteractionType::Viewed.is_high_signal());
        assert!(!InteractionType::Shared.is_high_signal());
        assert!(!InteractionType::Reported.is_high_signal());
    }

    #[test]
    fn test_interaction_metadata_wire_format() {
        let metadata = InteractionMetadata {
            time_spent: Some(42.0),
            scroll_depth: Some(0.8),
            source: Some("recommendation".to_string()),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["timeSpent"], 42.0);
        assert_eq!(json["scrollDepth"], 0.8);
        assert_eq!(json["source"], "recommendation");
    }

    #[test]
    fn test_filters_wire_format() {
        let parsed: RecommendationFilters = serde_json::from_str(
            r#"{"locations":["Berlin"],"employmentTypes":["full-time"],"postedWithinDays":7}"#,
        )
        .unwrap();
        assert_eq!(parsed.locations.as_deref(), Some(&["Berlin".to_string()][..]));
        assert_eq!(parsed.posted_within_days, Some(7));
        assert!(parsed.exclude_companies.is_none());
    }
}
