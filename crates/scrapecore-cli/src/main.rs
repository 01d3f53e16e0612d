//! Standalone worker entry point, grounded on `riptide-workers::main`: parse
//! args, build the same shared components `scrapecore-api` builds, run
//! either one manual pass or the cron loop, shut down on Ctrl+C.

use clap::Parser;
use scrapecore_fetch::Fetcher;
use scrapecore_orchestrator::{CronScheduler, Scraper};
use scrapecore_ratelimit::{ConcurrencyGate, RateLimiter};
use scrapecore_robots::{RobotsCache, RobotsConfig};
use scrapecore_store::{ContentStore, RunLogRepository};
use scrapecore_types::{AppConfig, TriggerSource};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scrapecore-cli")]
#[command(about = "Scrapecore standalone worker: manual or cron-scheduled scraper runs")]
struct Args {
    /// Run every adapter once and exit, instead of honoring `AUTO_SCRAPE_ENABLED`.
    #[arg(long)]
    once: bool,

    /// Overrides `AUTO_SCRAPE_ENABLED` from the environment.
    #[arg(long, env = "AUTO_SCRAPE_ENABLED")]
    auto_scrape_enabled: Option<bool>,

    /// Overrides `SCRAPE_CRON_SCHEDULE` from the environment.
    #[arg(long, env = "SCRAPE_CRON_SCHEDULE")]
    scrape_cron_schedule: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).json().init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(enabled) = args.auto_scrape_enabled {
        config.auto_scrape_enabled = enabled;
    }
    if let Some(schedule) = args.scrape_cron_schedule {
        config.scrape_cron_schedule = schedule;
    }
    let config = Arc::new(config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        once = args.once,
        auto_scrape_enabled = config.auto_scrape_enabled,
        scrape_cron_schedule = %config.scrape_cron_schedule,
        "starting scrapecore-cli"
    );

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
    let scraper = Arc::new(Scraper::new(
        config.clone(),
        fetcher,
        robots,
        limiter,
        gate,
        content_store,
        run_logs,
        adapters,
    ));

    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl_c");
        tracing::info!("received shutdown signal");
    };

    if args.once {
        tracing::info!("running a single manual pass over every adapter");
        tokio::select! {
            result = scraper.start_all(TriggerSource::Manual, Some("cli".to_string())) => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "manual run failed to start");
                }
            }
            _ = shutdown_signal => {
                tracing::info!("shutdown requested before the manual run finished");
            }
        }
    } else if config.auto_scrape_enabled {
        let scheduler = CronScheduler::new(scraper.clone(), &config.scrape_cron_schedule)?;
        tracing::info!(schedule = %config.scrape_cron_schedule, "cron scheduler running");
        tokio::select! {
            _ = scheduler.run() => {}
            _ = shutdown_signal => {
                scheduler.stop();
            }
        }
    } else {
        tracing::warn!("AUTO_SCRAPE_ENABLED is false and --once was not passed; nothing to do, waiting for Ctrl+C");
        shutdown_signal.await;
    }

    tracing::info!("stopping scraper");
    scraper.stop_all().await;
    tracing::info!("scrapecore-cli shutdown complete");
    Ok(())
}
