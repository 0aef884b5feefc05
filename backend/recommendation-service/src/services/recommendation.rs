//! Recommendation service
//!
//! Orchestrates a recommendation run: request validation, cache lookup,
//! profile-aware filter merging, the hybrid repository search, enrichment
//! into scored results with human-readable match reasons, personalization,
//! quality/diversity filtering, caching, and pagination. Interaction
//! tracking and profile updates also enter through here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::ResultCache;
use crate::db::{JobSearchRepo, ScoredJobRow};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    InteractionMetadata, InteractionState, InteractionType, RecommendationFilters,
    RecommendationOutcome, RecommendationRequest, ScoredJobPost, SearchMetadata, UserProfile,
    UserProfileUpdate,
};
use crate::services::personalization::{round2, PersonalizationEngine};
use crate::utils::text::normalize;

pub const ALGORITHM_VERSION: &str = "3.0";

/// TTL for memoized result sets
const RESULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Jobs fetched from the repository per run; oversized so quality filtering
/// still leaves full pages.
const MIN_FETCH_LIMIT: usize = 100;

const MAX_SKILLS: usize = 50;
const MAX_PAGE_SIZE: usize = 100;
const MAX_PROFILE_SKILLS: usize = 50;
const MAX_JOBS_PER_COMPANY: usize = 3;
const MIN_RELEVANCE_SCORE: f64 = 5.0;

const PERSONALIZATION_FACTORS: [&str; 3] =
    ["user_profile", "interaction_history", "engagement_patterns"];

/// Ordered seniority ladder; the first keyword contained in the title wins.
const SENIORITY_LEVELS: [&str; 11] = [
    "intern",
    "junior",
    "mid-level",
    "senior",
    "lead",
    "principal",
    "staff",
    "architect",
    "director",
    "vp",
    "chief",
];

pub struct RecommendationService {
    repo: Arc<JobSearchRepo>,
    cache: ResultCache<Vec<ScoredJobPost>>,
    personalization: PersonalizationEngine,
}

impl RecommendationService {
    pub fn new(repo: Arc<JobSearchRepo>, cache: ResultCache<Vec<ScoredJobPost>>) -> Self {
        let personalization = PersonalizationEngine::new(Arc::clone(&repo));
        Self {
            repo,
            cache,
            personalization,
        }
    }

    /// Generate recommendations for a validated request.
    ///
    /// Anonymous and non-exclusion searches are served from (and written to)
    /// the result cache; personalized exclusion searches always hit the
    /// repository. Cached lists are paginated as stored, without reapplying
    /// personalization.
    pub async fn generate_recommendations(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationOutcome> {
        let started = Instant::now();
        validate_request(&request)?;

        let cache_key = generate_cache_key(&request);
        let cacheable = request.user_id.is_none() || !request.exclude_viewed;

        if cacheable {
            if let Some(cached) = self.cache.get(&cache_key).await {
                metrics::observe_cache_lookup(true);
                debug!(key = %cache_key, "Serving recommendations from cache");
                let total_count = cached.len();
                let recommendations = paginate(&cached, request.page, request.page_size);
                let metadata = build_metadata(
                    &request,
                    started.elapsed(),
                    true,
                    false,
                    request.filters.clone(),
                );
                return Ok(RecommendationOutcome {
                    recommendations,
                    metadata,
                    total_count,
                    new_jobs_count: total_count as i64,
                });
            }
            metrics::observe_cache_lookup(false);
        }

        // Stored preferences fill in where the request's filters are silent
        let mut personalization_applied = false;
        let mut effective_filters = request.filters.clone();
        if let Some(user_id) = request.user_id {
            if let Some(profile) = self.repo.get_user_profile(user_id).await? {
                effective_filters = Some(merge_filters_with_profile(
                    request.filters.as_ref(),
                    &profile,
                ));
                personalization_applied = true;
            }
        }

        let fetch_limit = std::cmp::max(MIN_FETCH_LIMIT, request.page_size * 5) as i64;
        let raw_jobs = self
            .repo
            .find_relevant_jobs(
                &request.job_title,
                &request.skills,
                request.user_id,
                effective_filters.as_ref(),
                request.exclude_viewed,
                fetch_limit,
            )
            .await?;

        let interaction_map = match request.user_id {
            Some(user_id) if !raw_jobs.is_empty() => {
                let job_ids: Vec<Uuid> = raw_jobs.iter().map(|job| job.id).collect();
                self.repo
                    .get_user_job_interactions(user_id, &job_ids)
                    .await?
            }
            _ => HashMap::new(),
        };

        let authenticated = request.user_id.is_some();
        let mut scored: Vec<ScoredJobPost> = raw_jobs
            .into_iter()
            .map(|row| {
                enrich_job(
                    row,
                    &request.job_title,
                    &request.skills,
                    &interaction_map,
                    authenticated,
                )
            })
            .collect();

        if let Some(user_id) = request.user_id {
            scored = self
                .personalization
                .apply_personalization_boost(scored, user_id)
                .await;
            personalization_applied = true;
        }

        scored = apply_quality_filters(scored);
        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if cacheable {
            self.cache
                .set(&cache_key, scored.clone(), Some(RESULT_CACHE_TTL))
                .await;
        }

        // Count query is best-effort; it degrades to the result length
        let new_jobs_count = match request.user_id {
            Some(user_id) => resolve_new_jobs_count(
                self.repo
                    .get_new_jobs_count(&request.job_title, &request.skills, user_id)
                    .await,
                scored.len(),
            ),
            None => scored.len() as i64,
        };

        // Analytics write is fire-and-forget; the response never waits on it
        if let Some(session_id) = request.session_id.clone() {
            let repo = Arc::clone(&self.repo);
            let user_id = request.user_id;
            let job_title = request.job_title.clone();
            let skills = request.skills.clone();
            let filters = effective_filters.clone();
            let results_count = scored.len() as i32;
            let results_shown = scored.len().min(request.page_size) as i32;
            tokio::spawn(async move {
                if let Err(e) = repo
                    .save_search_query(
                        user_id,
                        &session_id,
                        &job_title,
                        &skills,
                        filters.as_ref(),
                        results_count,
                        results_shown,
                    )
                    .await
                {
                    warn!("Failed to save search query: {}", e);
                }
            });
        }

        let total_count = scored.len();
        let recommendations = paginate(&scored, request.page, request.page_size);
        let metadata = build_metadata(
            &request,
            started.elapsed(),
            false,
            personalization_applied,
            effective_filters,
        );

        Ok(RecommendationOutcome {
            recommendations,
            metadata,
            total_count,
            new_jobs_count,
        })
    }

    /// Record a user interaction. High-signal events invalidate the user's
    /// cached result sets, since they change future personalized and
    /// exclusion-based searches.
    pub async fn track_job_interaction(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        interaction_type: InteractionType,
        session_id: Option<&str>,
        metadata: Option<InteractionMetadata>,
    ) -> Result<()> {
        let metadata_json = metadata.and_then(|m| serde_json::to_value(m).ok());
        self.repo
            .track_interaction(
                user_id,
                job_id,
                interaction_type.as_str(),
                session_id,
                metadata_json,
            )
            .await?;

        if interaction_type.is_high_signal() {
            self.cache
                .invalidate_pattern(&format!("user:{}:*", user_id))
                .await;
        }

        Ok(())
    }

    /// Record explicit recommendation feedback as a `feedback_{type}`
    /// interaction.
    pub async fn submit_feedback(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        feedback_type: &str,
        reason: Option<String>,
    ) -> Result<()> {
        let metadata = reason.map(|reason| serde_json::json!({ "reason": reason }));
        self.repo
            .track_interaction(
                user_id,
                job_id,
                &format!("feedback_{}", feedback_type),
                None,
                metadata,
            )
            .await
    }

    pub async fn get_user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        self.repo.get_user_profile(user_id).await
    }

    /// Fold the latest search into the stored profile: new skills are merged
    /// (deduplicated by exact string, capped to the most recent 50) and the
    /// desired title tracks the latest search.
    pub async fn update_user_profile(
        &self,
        user_id: Uuid,
        job_title: &str,
        skills: &[String],
    ) -> Result<()> {
        let existing = self.repo.get_user_profile(user_id).await?;

        let mut updated_skills = existing.map(|p| p.skills).unwrap_or_default();
        for skill in skills {
            if !updated_skills.contains(skill) {
                updated_skills.push(skill.clone());
            }
        }
        if updated_skills.len() > MAX_PROFILE_SKILLS {
            updated_skills = updated_skills.split_off(updated_skills.len() - MAX_PROFILE_SKILLS);
        }

        self.repo
            .upsert_user_profile(
                user_id,
                &UserProfileUpdate {
                    desired_job_title: Some(job_title.to_string()),
                    skills: Some(updated_skills),
                    ..Default::default()
                },
            )
            .await
    }
}

/// Explicit fallback branch for the best-effort count query: a failure is
/// logged and the count degrades to the result length.
pub fn resolve_new_jobs_count(count: Result<i64>, result_len: usize) -> i64 {
    match count {
        Ok(count) => count,
        Err(e) => {
            warn!("New jobs count unavailable, falling back to result length: {}", e);
            result_len as i64
        }
    }
}

/// Reject malformed requests before any I/O happens
pub fn validate_request(request: &RecommendationRequest) -> Result<()> {
    if request.job_title.trim().is_empty() {
        return Err(AppError::Validation("Job title is required".to_string()));
    }

    if request.skills.is_empty() {
        return Err(AppError::Validation(
            "At least one skill is required".to_string(),
        ));
    }

    if request.skills.len() > MAX_SKILLS {
        return Err(AppError::Validation(format!(
            "Maximum {} skills allowed",
            MAX_SKILLS
        )));
    }

    if request.skills.iter().any(|skill| skill.trim().is_empty()) {
        return Err(AppError::Validation(
            "All skills must be non-empty strings".to_string(),
        ));
    }

    if request.page < 1 {
        return Err(AppError::Validation("page must be >= 1".to_string()));
    }

    if request.page_size < 1 || request.page_size > MAX_PAGE_SIZE {
        return Err(AppError::Validation(format!(
            "pageSize must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    Ok(())
}

/// Deterministic cache key over identity, normalized title, sorted skills,
/// filters, and the exclusion flag.
pub fn generate_cache_key(request: &RecommendationRequest) -> String {
    let mut sorted_skills = request.skills.clone();
    sorted_skills.sort();

    let identity = request
        .user_id
        .map(|id| format!("user:{}", id))
        .unwrap_or_else(|| "anon".to_string());
    let filters = request
        .filters
        .as_ref()
        .and_then(|f| serde_json::to_string(f).ok())
        .map(|json| format!("filters:{}", json))
        .unwrap_or_default();
    let exclusion = if request.exclude_viewed {
        "exclude-viewed".to_string()
    } else {
        String::new()
    };

    [
        identity,
        format!("title:{}", normalize(&request.job_title)),
        format!("skills:{}", sorted_skills.join(",")),
        filters,
        exclusion,
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(":")
}

/// Profile preferences fill in where the request is silent; excluded
/// companies are unioned.
pub fn merge_filters_with_profile(
    request_filters: Option<&RecommendationFilters>,
    profile: &UserProfile,
) -> RecommendationFilters {
    let mut merged = request_filters.cloned().unwrap_or_default();

    if merged.locations.is_none() && !profile.preferred_locations.is_empty() {
        merged.locations = Some(profile.preferred_locations.clone());
    }
    if merged.employment_types.is_none() && !profile.preferred_employment_types.is_empty() {
        merged.employment_types = Some(profile.preferred_employment_types.clone());
    }
    if !profile.excluded_companies.is_empty() {
        let mut companies = merged.exclude_companies.unwrap_or_default();
        for company in &profile.excluded_companies {
            if !companies.contains(company) {
                companies.push(company.clone());
            }
        }
        merged.exclude_companies = Some(companies);
    }

    merged
}

fn extract_seniority_level(title: &str) -> Option<&'static str> {
    SENIORITY_LEVELS.iter().find(|level| title.contains(*level)).copied()
}

/// Enrich a raw scored row into the response shape: human-readable match
/// reasons, the substring-based skill match count, and per-user interaction
/// state when an identity is present.
pub fn enrich_job(
    row: ScoredJobRow,
    user_job_title: &str,
    user_skills: &[String],
    interaction_map: &HashMap<Uuid, InteractionState>,
    authenticated: bool,
) -> ScoredJobPost {
    let mut match_reasons: Vec<String> = Vec::new();
    let description_lower = row
        .description_text
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    let title_lower = row.title.to_lowercase();

    if row.title_similarity > 0.5 {
        match_reasons.push("Strong title match".to_string());
    } else if row.title_similarity > 0.3 {
        match_reasons.push("Similar job title".to_string());
    }

    // Independent substring-based re-derivation; intentionally distinct from
    // the repository's regex-based exact count.
    let matched_skills: Vec<&String> = user_skills
        .iter()
        .filter(|skill| {
            let skill_lower = skill.to_lowercase();
            description_lower.contains(&skill_lower) || title_lower.contains(&skill_lower)
        })
        .collect();

    let skill_match_count = matched_skills.len();
    if skill_match_count >= 3 {
        match_reasons.push(format!("{} of your skills match", skill_match_count));
    } else if skill_match_count == 2 {
        match_reasons.push(format!(
            "2 skills match: {}, {}",
            matched_skills[0], matched_skills[1]
        ));
    } else if skill_match_count == 1 {
        match_reasons.push(format!("Matches skill: {}", matched_skills[0]));
    }

    if let Some(level) = extract_seniority_level(&user_job_title.to_lowercase()) {
        if title_lower.contains(level) {
            match_reasons.push("Matching seniority level".to_string());
        }
    }

    let recently_posted = row
        .posted_at
        .map(|posted| {
            let days_old = (chrono::Utc::now().date_naive() - posted).num_days();
            days_old <= 7
        })
        .unwrap_or(false);
    if recently_posted {
        match_reasons.push("Recently posted".to_string());
    }

    if match_reasons.is_empty() {
        match_reasons.push("General match".to_string());
    }

    let interaction = interaction_map.get(&row.id).copied().unwrap_or_default();
    let (is_viewed, is_saved, interaction_count) = if authenticated {
        (
            Some(interaction.is_viewed),
            Some(interaction.is_saved),
            Some(interaction.count),
        )
    } else {
        (None, None, None)
    };

    ScoredJobPost {
        id: row.id,
        title: row.title,
        company_name: row.company_name,
        company_logo: row.company_logo,
        location: row.location,
        salary_info: row.salary_info,
        posted_at: row.posted_at,
        description_text: row.description_text,
        description_html: row.description_html,
        apply_url: row.apply_url,
        job_function: row.job_function,
        employment_type: row.employment_type,
        expire_at: row.expire_at,
        link: row.link,
        source: row.source,
        relevance_score: round2(row.relevance_score),
        match_reasons,
        skill_match_count,
        title_similarity: row.title_similarity,
        personalization_boost: 0.0,
        is_viewed,
        is_saved,
        interaction_count,
    }
}

/// Quality filters, in order: dedup by case-insensitive (company, title),
/// relevance floor, then the per-company diversity cap.
pub fn apply_quality_filters(jobs: Vec<ScoredJobPost>) -> Vec<ScoredJobPost> {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<ScoredJobPost> = jobs
        .into_iter()
        .filter(|job| seen.insert(format!("{}-{}", job.company_name, job.title).to_lowercase()))
        .collect();

    let filtered: Vec<ScoredJobPost> = unique
        .into_iter()
        .filter(|job| job.relevance_score >= MIN_RELEVANCE_SCORE)
        .collect();

    ensure_company_diversity(filtered, MAX_JOBS_PER_COMPANY)
}

fn ensure_company_diversity(
    jobs: Vec<ScoredJobPost>,
    max_per_company: usize,
) -> Vec<ScoredJobPost> {
    let mut company_count: HashMap<String, usize> = HashMap::new();

    jobs.into_iter()
        .filter(|job| {
            let company = if job.company_name.is_empty() {
                "unknown".to_string()
            } else {
                job.company_name.to_lowercase()
            };
            let count = company_count.entry(company).or_insert(0);
            if *count < max_per_company {
                *count += 1;
                true
            } else {
                false
            }
        })
        .collect()
}

/// Slice pagination; an out-of-range page yields an empty list, not an error
pub fn paginate(jobs: &[ScoredJobPost], page: usize, page_size: usize) -> Vec<ScoredJobPost> {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= jobs.len() {
        return Vec::new();
    }
    let end = (start + page_size).min(jobs.len());
    jobs[start..end].to_vec()
}

fn build_metadata(
    request: &RecommendationRequest,
    elapsed: Duration,
    cache_hit: bool,
    personalization_applied: bool,
    filters_applied: Option<RecommendationFilters>,
) -> SearchMetadata {
    SearchMetadata {
        user_job_title: request.job_title.clone(),
        user_skills: request.skills.clone(),
        algorithm_version: ALGORITHM_VERSION.to_string(),
        filters_applied,
        execution_time_ms: elapsed.as_millis() as u64,
        cache_hit,
        personalization_factors: personalization_applied.then(|| {
            PERSONALIZATION_FACTORS
                .iter()
                .map(|s| s.to_string())
                .collect()
        }),
    }
}
