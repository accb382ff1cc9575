//! # fincare: cached payer and provider claim analytics
//!
//! `fincare` serves the analytics pages of a healthcare financing dashboard. Each payer and each
//! provider has a page summarising its claims: totals billed and paid, denial rate, a monthly
//! series and its largest counterparties. Computing these from the claims table is expensive, so
//! results are stored as snapshots and served from there until they go stale.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence.
//!
//! ### Request Flow
//!
//! A request to `/api/v1/payers/{id}/analytics` goes through three steps:
//!
//! 1. The id and the optional `refresh` flag are validated. Nothing touches storage until both
//!    are well formed.
//! 2. The payer is looked up; a missing payer is a 404.
//! 3. The [`analytics::AnalyticsCacheRefresher`] returns the current snapshot, or recomputes one
//!    from claims when there is none, when it is older than `analytics.snapshot_max_age`, or when
//!    `refresh=true` was passed. Concurrent recomputes of the same subject share one computation.
//!
//! Providers follow the same flow at `/api/v1/providers/{id}/analytics`.
//!
//! ### Core Components
//!
//! - [`analytics`]: the read-through cache, freshness policies, single-flight deduplication and
//!   the PostgreSQL-backed [`analytics::AnalyticsStore`]
//! - [`api`]: HTTP handlers and request/response models
//! - [`db`]: repositories for payers, providers, claims and snapshots
//! - [`mappings`]: column mapping checks for claim uploads
//! - [`config`]: YAML and environment configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use fincare::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = fincare::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     fincare::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run automatically on startup. To run them by hand:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! fincare::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
pub mod analytics;
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod mappings;
mod openapi;
pub mod pool_metrics;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use analytics::{AnalyticsCacheRefresher, AnalyticsStore, freshness, postgres::PgAnalyticsStore};
use axum::http::HeaderValue;
use axum::{
    Json, Router, http,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use config::CorsOrigin;
use openapi::ApiDoc;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{PayerId, ProviderId, SnapshotId};

/// Application state shared across all request handlers.
///
/// Handlers reach storage only through the refresher, so tests can build a state around an
/// in-memory [`AnalyticsStore`].
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .refresher(Arc::new(refresher))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub refresher: Arc<AnalyticsCacheRefresher>,
}

/// Get the fincare database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the analytics cache over `store` according to the `analytics` config section
pub fn build_refresher(config: &Config, store: Arc<dyn AnalyticsStore>) -> AnalyticsCacheRefresher {
    let freshness = freshness::from_max_age(config.analytics.snapshot_max_age);
    AnalyticsCacheRefresher::new(store, freshness).with_single_flight(config.analytics.single_flight)
}

/// Connect to PostgreSQL with the configured pool settings and run migrations
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    let seconds = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(seconds(settings.idle_timeout_secs))
        .max_lifetime(seconds(settings.max_lifetime_secs))
        .connect(&config.database.url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {e}"))?;

    migrator().run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}

/// Create CORS layer from configuration
///
/// A wildcard anywhere in `allowed_origins` allows every origin.
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let origins = &config.cors.allowed_origins;
    let allow_origin = if origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut values = Vec::new();
        for origin in origins {
            if let CorsOrigin::Url(url) = origin {
                values.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(values)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/healthz` liveness check
/// - `/api/v1/*` analytics and claim mapping endpoints
/// - `/openapi.json` and `/docs` for API documentation
/// - `/internal/metrics` when `enable_metrics` is set
///
/// # Errors
///
/// Returns an error if the CORS configuration cannot be turned into header values.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route(
            "/payers/{id}/analytics",
            get(api::handlers::analytics::get_payer_analytics),
        )
        .route(
            "/providers/{id}/analytics",
            get(api::handlers::analytics::get_provider_analytics),
        )
        .route(
            "/claims/mappings/validate",
            post(api::handlers::mappings::validate_claim_mapping),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations and builds the
///    router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves, then stops background tasks and closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    shutdown_token: CancellationToken,
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting fincare with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        let shutdown_token = CancellationToken::new();
        let mut background_tasks = Vec::new();

        if config.enable_metrics {
            let sampler_pool = pool.clone();
            let sampler_config = pool_metrics::PoolMetricsConfig::from(&config);
            let sampler_shutdown = shutdown_token.clone();
            background_tasks.push(tokio::spawn(async move {
                if let Err(e) =
                    pool_metrics::run_pool_metrics_sampler("main", sampler_pool, sampler_config, sampler_shutdown).await
                {
                    tracing::error!("Pool metrics sampler error: {}", e);
                }
            }));
        }

        let store: Arc<dyn AnalyticsStore> = Arc::new(PgAnalyticsStore::new(pool.clone()));
        let state = AppState::builder()
            .config(config.clone())
            .refresher(Arc::new(build_refresher(&config, store)))
            .build();
        let router = build_router(&state)?;

        Ok(Self {
            router,
            config,
            pool,
            shutdown_token,
            background_tasks,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "fincare listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Stop background tasks and wait for them to finish
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
