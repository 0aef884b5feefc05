//! Job Search Repository
//!
//! All database operations behind the recommendation engine: the hybrid
//! multi-signal search, interaction tracking and state lookup, search-query
//! analytics, user profiles, and engagement-metric aggregation.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    EngagementMetrics, InteractionState, RecommendationFilters, UserProfile, UserProfileUpdate,
};
use crate::utils::text::{escape_regex, normalize};

/// Raw scored row from the hybrid search query. Typed at the data-access
/// boundary; business logic never sees an untyped map.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScoredJobRow {
    pub id: Uuid,
    pub link: Option<String>,
    pub title: String,
    pub company_name: String,
    pub company_logo: Option<String>,
    pub location: Option<String>,
    pub salary_info: Option<serde_json::Value>,
    pub posted_at: Option<chrono::NaiveDate>,
    pub description_text: Option<String>,
    pub description_html: Option<String>,
    pub apply_url: Option<String>,
    pub job_function: Option<String>,
    pub employment_type: Option<String>,
    pub expire_at: Option<chrono::NaiveDate>,
    pub source: Option<String>,
    pub fts_score: f64,
    pub title_similarity: f64,
    pub exact_skill_matches: i64,
    pub fuzzy_skill_matches: i64,
    pub user_saved_count: i32,
    pub user_interaction_count: i32,
    pub relevance_score: f64,
}

/// Disjunctive websearch query over the normalized title and skills
fn build_search_terms(normalized_title: &str, normalized_skills: &[String]) -> String {
    let mut terms = Vec::with_capacity(normalized_skills.len() + 1);
    terms.push(normalized_title.to_string());
    terms.extend(normalized_skills.iter().cloned());
    terms.join(" OR ")
}

/// Escaped alternation pattern for substring/regex skill matching.
/// Empty when there are no usable skills.
fn build_skill_pattern(normalized_skills: &[String]) -> String {
    normalized_skills
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| escape_regex(s))
        .collect::<Vec<_>>()
        .join("|")
}

fn json_string_array(value: Option<serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
        .unwrap_or_default()
}

fn to_json<T: Serialize>(value: Option<&T>) -> Option<serde_json::Value> {
    value.and_then(|v| serde_json::to_value(v).ok())
}

pub struct JobSearchRepo {
    pool: PgPool,
}

impl JobSearchRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Multi-strategy job search.
    ///
    /// A posting qualifies when the weighted full-text index matches the
    /// search terms, the normalized titles are trigram-similar (> 0.15), or
    /// the description matches the skill alternation pattern. Expired
    /// postings are always excluded; postings the user has viewed, dismissed,
    /// or applied to in the last 90 days are excluded when `exclude_viewed`
    /// is set. Results carry per-signal component scores and the composite
    /// relevance score, ordered by score then posting date.
    pub async fn find_relevant_jobs(
        &self,
        job_title: &str,
        skills: &[String],
        user_id: Option<Uuid>,
        filters: Option<&RecommendationFilters>,
        exclude_viewed: bool,
        limit: i64,
    ) -> Result<Vec<ScoredJobRow>> {
        let normalized_title = normalize(job_title);
        let normalized_skills: Vec<String> = skills.iter().map(|s| normalize(s)).collect();
        let search_terms = build_search_terms(&normalized_title, &normalized_skills);
        let skill_pattern = build_skill_pattern(&normalized_skills);

        let locations = filters.and_then(|f| f.locations.clone());
        let employment_types = filters.and_then(|f| f.employment_types.clone());
        let posted_within_days = filters.and_then(|f| f.posted_within_days);
        let exclude_companies = filters.and_then(|f| f.exclude_companies.clone());

        let rows = sqlx::query_as::<_, ScoredJobRow>(
            r#"
            WITH skill_matches AS (
                SELECT
                    jp.id,
                    jp.link,
                    jp.title,
                    jp.company_name,
                    jp.company_logo,
                    jp.location,
                    jp.salary_info,
                    jp.posted_at,
                    jp.description_text,
                    jp.description_html,
                    jp.apply_url,
                    jp.job_function,
                    jp.employment_type,
                    jp.expire_at,
                    jp.source,
                    -- Full-text ranking, title index weighted over description
                    (
                        ts_rank_cd(jp.fts_title, websearch_to_tsquery('english', $2)) * 4.0
                        + ts_rank_cd(jp.fts_description, websearch_to_tsquery('english', $2)) * 2.0
                    )::FLOAT8 AS fts_score,
                    similarity(LOWER(jp.title), $1)::FLOAT8 AS title_similarity,
                    -- Boundary-respecting skill matches across text fields
                    (
                        SELECT COUNT(*)
                        FROM unnest($3::text[]) AS skill
                        WHERE LOWER(jp.description_text) ~ skill
                           OR LOWER(jp.title) ~ skill
                           OR LOWER(COALESCE(jp.job_function, '')) ~ skill
                    ) AS exact_skill_matches,
                    -- Looser substring containment, description only
                    (
                        SELECT COUNT(DISTINCT skill)
                        FROM unnest($3::text[]) AS skill
                        WHERE LOWER(jp.description_text) LIKE '%' || skill || '%'
                    ) AS fuzzy_skill_matches,
                    CASE
                        WHEN $5::uuid IS NULL THEN 0
                        ELSE COALESCE((
                            SELECT COUNT(*)::int
                            FROM job_interactions ji
                            WHERE ji.job_id = jp.id
                              AND ji.user_id = $5
                              AND ji.interaction_type = 'saved'
                        ), 0)
                    END AS user_saved_count,
                    CASE
                        WHEN $5::uuid IS NULL THEN 0
                        ELSE COALESCE((
                            SELECT COUNT(*)::int
                            FROM job_interactions ji
                            WHERE ji.job_id = jp.id
                              AND ji.user_id = $5
                        ), 0)
                    END AS user_interaction_count
                FROM job_posts jp
                WHERE
                    (jp.expire_at IS NULL OR jp.expire_at > CURRENT_DATE)
                    AND (
                        $5::uuid IS NULL
                        OR NOT $6::bool
                        OR jp.id NOT IN (
                            SELECT DISTINCT job_id
                            FROM job_interactions
                            WHERE user_id = $5
                              AND interaction_type IN ('viewed', 'dismissed', 'clicked_apply')
                              AND created_at >= CURRENT_DATE - INTERVAL '90 days'
                        )
                    )
                    AND (
                        jp.fts @@ websearch_to_tsquery('english', $2)
                        OR similarity(LOWER(jp.title), $1) > 0.15
                        OR ($4 <> '' AND LOWER(jp.description_text) ~ $4)
                    )
                    AND (
                        $7::text[] IS NULL
                        OR EXISTS (
                            SELECT 1
                            FROM unnest($7::text[]) AS loc
                            WHERE jp.location ILIKE '%' || loc || '%'
                        )
                    )
                    AND ($8::text[] IS NULL OR jp.employment_type = ANY($8))
                    AND ($9::int IS NULL OR jp.posted_at >= CURRENT_DATE - $9::int)
                    AND ($10::text[] IS NULL OR jp.company_name <> ALL($10))
            )
            SELECT
                *,
                (
                    LEAST(fts_score * 30, 30)
                    + title_similarity * 25
                    + LEAST(exact_skill_matches * 10, 30)
                    + LEAST(fuzzy_skill_matches * 2, 10)
                    + CASE
                        WHEN posted_at >= CURRENT_DATE - 7 THEN 5
                        WHEN posted_at >= CURRENT_DATE - 14 THEN 3
                        WHEN posted_at >= CURRENT_DATE - 30 THEN 1
                        ELSE 0
                    END
                    + CASE WHEN user_saved_count > 0 THEN 5 ELSE 0 END
                )::FLOAT8 AS relevance_score
            FROM skill_matches
            WHERE fts_score > 0.001 OR title_similarity > 0.15 OR exact_skill_matches > 0
            ORDER BY relevance_score DESC, posted_at DESC NULLS LAST
            LIMIT $11
            "#,
        )
        .bind(&normalized_title)
        .bind(&search_terms)
        .bind(&normalized_skills)
        .bind(&skill_pattern)
        .bind(user_id)
        .bind(exclude_viewed)
        .bind(locations)
        .bind(employment_types)
        .bind(posted_within_days)
        .bind(exclude_companies)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Hybrid job search failed: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(rows)
    }

    /// Count postings matching the search that the user has never interacted
    /// with in the last 90 days.
    pub async fn get_new_jobs_count(
        &self,
        job_title: &str,
        skills: &[String],
        user_id: Uuid,
    ) -> Result<i64> {
        let normalized_title = normalize(job_title);
        let normalized_skills: Vec<String> = skills.iter().map(|s| normalize(s)).collect();
        let search_terms = build_search_terms(&normalized_title, &normalized_skills);

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT jp.id)
            FROM job_posts jp
            WHERE
                (jp.expire_at IS NULL OR jp.expire_at > CURRENT_DATE)
                AND jp.id NOT IN (
                    SELECT DISTINCT job_id
                    FROM job_interactions
                    WHERE user_id = $3
                      AND created_at >= CURRENT_DATE - INTERVAL '90 days'
                )
                AND (
                    jp.fts @@ websearch_to_tsquery('english', $2)
                    OR similarity(LOWER(jp.title), $1) > 0.15
                )
            "#,
        )
        .bind(&normalized_title)
        .bind(&search_terms)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("New jobs count failed: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(count)
    }

    /// Append an interaction event. The log is append-only; rows are never
    /// updated or deleted here.
    pub async fn track_interaction(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        interaction_type: &str,
        session_id: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_interactions (user_id, job_id, interaction_type, session_id, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(job_id)
        .bind(interaction_type)
        .bind(session_id)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
                AppError::NotFound(format!("Job {} does not exist", job_id))
            }
            _ => {
                error!("Failed to track interaction: {}", e);
                AppError::Database(e.to_string())
            }
        })?;

        Ok(())
    }

    /// Batched per-job interaction state for one user
    pub async fn get_user_job_interactions(
        &self,
        user_id: Uuid,
        job_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, InteractionState>> {
        if job_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, bool, bool, i64)>(
            r#"
            SELECT
                job_id,
                BOOL_OR(interaction_type IN ('viewed', 'clicked_apply')) AS is_viewed,
                BOOL_OR(interaction_type = 'saved') AS is_saved,
                COUNT(*) AS interaction_count
            FROM job_interactions
            WHERE user_id = $1
              AND job_id = ANY($2)
            GROUP BY job_id
            "#,
        )
        .bind(user_id)
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load interaction state: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(rows
            .into_iter()
            .map(|(job_id, is_viewed, is_saved, count)| {
                (
                    job_id,
                    InteractionState {
                        is_viewed,
                        is_saved,
                        count,
                    },
                )
            })
            .collect())
    }

    /// Record a search query for analytics
    pub async fn save_search_query(
        &self,
        user_id: Option<Uuid>,
        session_id: &str,
        job_title: &str,
        skills: &[String],
        filters: Option<&RecommendationFilters>,
        results_count: i32,
        results_shown: i32,
    ) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO search_queries (
                user_id, session_id, job_title, skills, filters, results_count, results_shown
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .bind(job_title)
        .bind(serde_json::json!(skills))
        .bind(to_json(filters))
        .bind(results_count)
        .bind(results_shown)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save search query: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(id)
    }

    pub async fn get_user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let row = sqlx::query_as::<
            _,
            (
                Uuid,                      // user_id
                Option<String>,            // desired_job_title
                Option<serde_json::Value>, // skills
                Option<String>,            // experience_level
                Option<serde_json::Value>, // preferred_locations
                Option<serde_json::Value>, // preferred_employment_types
                Option<serde_json::Value>, // excluded_companies
                Option<serde_json::Value>, // preferences
            ),
        >(
            r#"
            SELECT
                user_id,
                desired_job_title,
                skills,
                experience_level,
                preferred_locations,
                preferred_employment_types,
                excluded_companies,
                preferences
            FROM user_profiles
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load user profile: {}", e);
            AppError::Database(e.to_string())
        })?
        .map(
            |(
                user_id,
                desired_job_title,
                skills,
                experience_level,
                preferred_locations,
                preferred_employment_types,
                excluded_companies,
                preferences,
            )| {
                UserProfile {
                    user_id,
                    desired_job_title,
                    skills: json_string_array(skills),
                    experience_level,
                    preferred_locations: json_string_array(preferred_locations),
                    preferred_employment_types: json_string_array(preferred_employment_types),
                    excluded_companies: json_string_array(excluded_companies),
                    preferences,
                }
            },
        );

        Ok(row)
    }

    /// Merge-upsert: every column keeps its stored value when the incoming
    /// value is absent.
    pub async fn upsert_user_profile(
        &self,
        user_id: Uuid,
        update: &UserProfileUpdate,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                user_id,
                desired_job_title,
                skills,
                experience_level,
                preferred_locations,
                preferred_employment_types,
                excluded_companies,
                preferences,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                desired_job_title = COALESCE(EXCLUDED.desired_job_title, user_profiles.desired_job_title),
                skills = COALESCE(EXCLUDED.skills, user_profiles.skills),
                experience_level = COALESCE(EXCLUDED.experience_level, user_profiles.experience_level),
                preferred_locations = COALESCE(EXCLUDED.preferred_locations, user_profiles.preferred_locations),
                preferred_employment_types = COALESCE(EXCLUDED.preferred_employment_types, user_profiles.preferred_employment_types),
                excluded_companies = COALESCE(EXCLUDED.excluded_companies, user_profiles.excluded_companies),
                preferences = COALESCE(EXCLUDED.preferences, user_profiles.preferences),
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(update.desired_job_title.as_deref())
        .bind(to_json(update.skills.as_ref()))
        .bind(update.experience_level.as_deref())
        .bind(to_json(update.preferred_locations.as_ref()))
        .bind(to_json(update.preferred_employment_types.as_ref()))
        .bind(to_json(update.excluded_companies.as_ref()))
        .bind(update.preferences.clone())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to upsert user profile: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(())
    }

    /// 90-day engagement aggregates: most-searched skills, most viewed/saved
    /// companies, and the average recorded time-spent.
    pub async fn get_user_engagement_metrics(&self, user_id: Uuid) -> Result<EngagementMetrics> {
        let top_skills = sqlx::query_scalar::<_, String>(
            r#"
            SELECT skill
            FROM (
                SELECT skill, COUNT(*) AS skill_count
                FROM (
                    SELECT jsonb_array_elements_text(skills) AS skill
                    FROM search_queries
                    WHERE user_id = $1
                      AND created_at >= CURRENT_DATE - INTERVAL '90 days'
                ) AS expanded
                GROUP BY skill
                ORDER BY skill_count DESC
                LIMIT 10
            ) AS ranked
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load top searched skills: {}", e);
            AppError::Database(e.to_string())
        })?;

        let preferred_companies = sqlx::query_scalar::<_, String>(
            r#"
            SELECT jp.company_name
            FROM job_interactions ji
            JOIN job_posts jp ON jp.id = ji.job_id
            WHERE ji.user_id = $1
              AND ji.interaction_type IN ('viewed', 'saved')
              AND ji.created_at >= CURRENT_DATE - INTERVAL '90 days'
            GROUP BY jp.company_name
            ORDER BY COUNT(*) DESC
            LIMIT 10
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load preferred companies: {}", e);
            AppError::Database(e.to_string())
        })?;

        let avg_interaction_time = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT COALESCE(AVG((metadata->>'timeSpent')::numeric), 0)::FLOAT8
            FROM job_interactions
            WHERE user_id = $1
              AND metadata->>'timeSpent' IS NOT NULL
              AND created_at >= CURRENT_DATE - INTERVAL '90 days'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load average interaction time: {}", e);
            AppError::Database(e.to_string())
        })?;

        Ok(EngagementMetrics {
            top_skills,
            preferred_companies,
            avg_interaction_time,
        })
    }
}
