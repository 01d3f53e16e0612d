//! Admin HTTP server entry point, grounded on `riptide-api::main` (build
//! the shared component `Arc`s once, construct `AppState`, bind, serve).

use scrapecore_api::{build_router, logging, state::AppState};
use scrapecore_fetch::Fetcher;
use scrapecore_ratelimit::{ConcurrencyGate, RateLimiter};
use scrapecore_robots::{RobotsCache, RobotsConfig};
use scrapecore_store::{ContentStore, RunLogRepository};
use scrapecore_types::AppConfig;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Six named streams (spec.md §6), each a size-rotated NDJSON file
/// carrying a narrower slice of the same event stream `combined.log`
/// carries in full, composed the way `riptide-api`'s
/// `tracing_subscriber::registry().with(...).init()` chain layers
/// stdout/file/OTLP exporters side by side.
fn init_logging(config: &AppConfig) -> std::io::Result<()> {
    let stdout_filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let combined = logging::open_stream("combined.log")?;
    let error_stream = logging::open_stream("error.log")?;
    let http_stream = logging::open_stream("http.log")?;
    let scraping_stream = logging::open_stream("scraping.log")?;
    let rejections_stream = logging::open_stream("rejections.log")?;
    let exceptions_stream = logging::open_stream("exceptions.log")?;
    logging::install_panic_hook(exceptions_stream);

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(stdout_filter))
        .with(fmt::layer().json().with_ansi(false).with_writer(combined).with_filter(EnvFilter::new("info")))
        .with(fmt::layer().json().with_ansi(false).with_writer(error_stream).with_filter(EnvFilter::new("error")))
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(http_stream)
                .with_filter(EnvFilter::new("tower_http=info")),
        )
        .with(
            fmt::layer().json().with_ansi(false).with_writer(scraping_stream).with_filter(EnvFilter::new(
                "scrapecore_orchestrator=info,scrapecore_adapters=info,scrapecore_fetch=info",
            )),
        )
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(rejections_stream)
                .with_filter(EnvFilter::new("task_panic=error")),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(AppConfig::from_env());
    init_logging(&config)?;

    let robots = Arc::new(RobotsCache::new(RobotsConfig {
        user_agent: config.robots_user_agent.clone(),
        ..RobotsConfig::default()
    })?);
    let limiter = Arc::new(RateLimiter::new(
        config.domain_profiles.clone().into_iter(),
        config.default_domain_profile.clone(),
    ));
    let gate = Arc::new(ConcurrencyGate::new(config.max_concurrent_requests));
    let fetcher = Arc::new(Fetcher::new(
        robots.clone(),
        gate.clone(),
        limiter.clone(),
        config.robots_user_agent.clone(),
    )?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;
    let content_store = Arc::new(ContentStore::new(pool.clone()));
    content_store.migrate().await?;
    let run_logs = Arc::new(RunLogRepository::new(pool));

    let adapters = scrapecore_adapters::default_adapters(&config);
    let scraper = Arc::new(scrapecore_orchestrator::Scraper::new(
        config.clone(),
        fetcher,
        robots,
        limiter,
        gate,
        content_store.clone(),
        run_logs.clone(),
        adapters,
    ));

    {
        let maintenance_scraper = scraper.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            ticker.tick().await; // skip the immediate first tick, nothing to clean up yet
            loop {
                ticker.tick().await;
                maintenance_scraper.run_maintenance_tick().await;
            }
        });
    }

    if config.auto_scrape_enabled {
        let cron_scraper = scraper.clone();
        let schedule = config.scrape_cron_schedule.clone();
        tokio::spawn(async move {
            match scrapecore_orchestrator::CronScheduler::new(cron_scraper, &schedule) {
                Ok(scheduler) => scheduler.run().await,
                Err(err) => tracing::error!(error = %err, "failed to start cron scheduler"),
            }
        });
    }

    let state = AppState {
        scraper,
        content_store,
        run_logs,
        config: config.clone(),
        started_at: std::time::Instant::now(),
    };
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "scrapecore-api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
