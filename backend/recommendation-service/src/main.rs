use actix_web::{dev::Service, web, App, HttpServer};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recommendation_service::config::Config;
use recommendation_service::db::JobSearchRepo;
use recommendation_service::handlers::{
    generate_recommendations, get_user_profile, submit_feedback, track_interaction, AppState,
};
use recommendation_service::middleware::JwtAuth;
use recommendation_service::services::RecommendationService;
use recommendation_service::{metrics, ResultCache};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Starting recommendation-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Environment: {}", config.app.env);

    // Initialize database (standardized pool)
    let mut db_cfg = db_pool::DbConfig::for_service("recommendation-service");
    if db_cfg.database_url.is_empty() {
        db_cfg.database_url = config.database.url.clone();
    }
    db_cfg.max_connections = std::cmp::max(db_cfg.max_connections, config.database.max_connections);
    db_cfg.log_config();

    let db_pool = match db_pool::create_pool(db_cfg).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database pool creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create database pool: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db_pool::migrate(&db_pool, &config.database.migrations_path).await {
        tracing::error!("Database migration failed: {:#}", e);
        eprintln!("ERROR: Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    // Result cache is owned here and injected into the service; the sweeper
    // guard keeps the background sweep alive for the process lifetime.
    let cache = ResultCache::new(Duration::from_secs(config.cache.result_ttl_secs));
    let _sweeper = cache.start_sweeper(Duration::from_secs(config.cache.sweep_interval_secs));
    tracing::info!(
        "Result cache initialized (ttl={}s, sweep={}s)",
        config.cache.result_ttl_secs,
        config.cache.sweep_interval_secs
    );

    let repo = Arc::new(JobSearchRepo::new(db_pool.clone()));
    let service = Arc::new(RecommendationService::new(repo, cache));
    let state = web::Data::new(AppState { service });

    let jwt_secret = config.auth.jwt_secret.clone();
    let port = config.app.port;

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/api/v1/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let path = req
                    .match_pattern()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| req.path().to_string());
                let start = Instant::now();

                let fut = srv.call(req);
                async move {
                    match fut.await {
                        Ok(res) => {
                            metrics::observe_http_request(
                                &method,
                                &path,
                                res.status().as_u16(),
                                start.elapsed(),
                            );
                            Ok(res)
                        }
                        Err(err) => {
                            metrics::observe_http_request(&method, &path, 500, start.elapsed());
                            Err(err)
                        }
                    }
                }
            })
            .service(
                web::scope("/api/v1")
                    .wrap(JwtAuth::new(jwt_secret.clone()))
                    .service(generate_recommendations)
                    .service(track_interaction)
                    .service(submit_feedback)
                    .service(get_user_profile),
            )
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}
