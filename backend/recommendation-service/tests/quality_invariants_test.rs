//! Invariant tests over the scoring, filtering, and pagination pipeline.
//! These run without any external services.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use recommendation_service::compute_boost;
use recommendation_service::db::ScoredJobRow;
use recommendation_service::models::{
    EngagementMetrics, RecommendationFilters, RecommendationRequest, ScoredJobPost,
};
use recommendation_service::services::recommendation::{
    apply_quality_filters, enrich_job, generate_cache_key, paginate,
};
use recommendation_service::utils::normalize;

fn row(title: &str, company: &str, score: f64) -> ScoredJobRow {
    ScoredJobRow {
        id: Uuid::new_v4(),
        link: None,
        title: title.to_string(),
        company_name: company.to_string(),
        company_logo: None,
        location: None,
        salary_info: None,
        posted_at: NaiveDate::from_ymd_opt(2024, 6, 1),
        description_text: Some("Distributed systems, APIs, storage".to_string()),
        description_html: None,
        apply_url: None,
        job_function: None,
        employment_type: None,
        expire_at: None,
        source: None,
        fts_score: 0.4,
        title_similarity: 0.2,
        exact_skill_matches: 1,
        fuzzy_skill_matches: 1,
        user_saved_count: 0,
        user_interaction_count: 0,
        relevance_score: score,
    }
}

fn post(title: &str, company: &str, score: f64) -> ScoredJobPost {
    enrich_job(row(title, company, score), "Engineer", &[], &HashMap::new(), false)
}

fn request() -> RecommendationRequest {
    RecommendationRequest {
        job_title: "Senior Software Engineer".to_string(),
        skills: vec!["JavaScript".to_string(), "React".to_string()],
        user_id: None,
        session_id: None,
        filters: None,
        exclude_viewed: true,
        page: 1,
        page_size: 20,
    }
}

#[test]
fn normalize_is_idempotent_over_varied_inputs() {
    for input in [
        "Senior Software Engineer",
        "C++ & C# Developer!!",
        "  Data\tEngineer (ETL / ELT)  ",
        "Über-Architekt",
    ] {
        let once = normalize(input);
        assert_eq!(normalize(&once), once, "normalize must be idempotent for {:?}", input);
    }
}

#[test]
fn quality_filters_enforce_all_three_invariants() {
    let mut jobs = Vec::new();
    // Duplicates across case
    jobs.push(post("Engineer", "Acme", 50.0));
    jobs.push(post("ENGINEER", "acme", 49.0));
    // Low-quality noise
    jobs.push(post("Gardener", "Plants Inc", 3.0));
    // A company flooding the list
    for i in 0..6 {
        jobs.push(post(&format!("Engineer L{}", i), "MegaCorp", 40.0 - i as f64));
    }
    jobs.push(post("Engineer", "Boutique", 20.0));

    let kept = apply_quality_filters(jobs);

    // Dedup: no two entries share a case-insensitive (company, title) pair
    let mut pairs = std::collections::HashSet::new();
    for job in &kept {
        let key = format!("{}-{}", job.company_name, job.title).to_lowercase();
        assert!(pairs.insert(key), "duplicate (company, title) pair survived");
    }

    // Quality floor
    assert!(kept.iter().all(|job| job.relevance_score >= 5.0));

    // Diversity: at most 3 entries per normalized company
    let mut per_company: HashMap<String, usize> = HashMap::new();
    for job in &kept {
        *per_company.entry(job.company_name.to_lowercase()).or_insert(0) += 1;
    }
    assert!(per_company.values().all(|&count| count <= 3));
    assert_eq!(per_company["megacorp"], 3);
}

#[test]
fn sorted_scores_are_non_increasing_after_pipeline() {
    let mut jobs: Vec<ScoredJobPost> = (0..30)
        .map(|i| post(&format!("Job {}", i), &format!("Company {}", i % 10), 5.0 + (i % 13) as f64))
        .collect();

    jobs = apply_quality_filters(jobs);
    jobs.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for window in jobs.windows(2) {
        assert!(window[0].relevance_score >= window[1].relevance_score);
    }

    let page = paginate(&jobs, 1, 20);
    assert!(page.len() <= 20);
}

#[test]
fn pagination_reconstructs_list_without_gaps_or_duplicates() {
    let jobs: Vec<ScoredJobPost> = (0..45)
        .map(|i| post(&format!("Job {}", i), &format!("Company {}", i), 50.0))
        .collect();

    for page_size in 1..=10 {
        let mut seen = std::collections::HashSet::new();
        let mut total = 0;
        for page in 1..=(45 / page_size + 2) {
            for job in paginate(&jobs, page, page_size) {
                assert!(seen.insert(job.id), "duplicate item across pages");
                total += 1;
            }
        }
        assert_eq!(total, jobs.len(), "gaps for page_size {}", page_size);
    }
}

#[test]
fn personalization_boost_is_monotonic_and_zero_without_signal() {
    let job = post("Rust Engineer", "Acme", 42.0);

    let no_signal = EngagementMetrics::default();
    assert_eq!(compute_boost(&job, &no_signal), 0.0);

    let with_signal = EngagementMetrics {
        top_skills: vec!["rust".to_string()],
        preferred_companies: vec!["acme".to_string()],
        avg_interaction_time: 0.0,
    };
    let boost = compute_boost(&job, &with_signal);
    assert!(boost >= 0.0);
    assert_eq!(boost, 7.0); // 5 company + 2 for one skill
}

#[test]
fn cache_key_ignores_filter_field_order_but_tracks_content() {
    let mut base = request();
    base.filters = Some(RecommendationFilters {
        locations: Some(vec!["Berlin".to_string()]),
        ..Default::default()
    });

    let mut same = request();
    same.filters = Some(RecommendationFilters {
        locations: Some(vec!["Berlin".to_string()]),
        ..Default::default()
    });

    let mut different = request();
    different.filters = Some(RecommendationFilters {
        locations: Some(vec!["Munich".to_string()]),
        ..Default::default()
    });

    assert_eq!(generate_cache_key(&base), generate_cache_key(&same));
    assert_ne!(generate_cache_key(&base), generate_cache_key(&different));
}
