mod helpers;

use helpers::Env;
use scrapecore_adapters::{NewsFeedAdapter, RelevanceFilter};
use scrapecore_orchestrator::Scraper;
use scrapecore_types::{AppConfig, DomainProfile, RunStatus, TriggerSource};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::clients::Cli;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        port: 3000,
        database_url: String::new(),
        allowed_origins: Vec::new(),
        search_keywords: vec!["webmethods".into()],
        max_items_per_category: 500,
        request_timeout: Duration::from_secs(5),
        max_retries: 2,
        max_concurrent_requests: 3,
        scrape_delay_min: Duration::from_millis(0),
        scrape_delay_max: Duration::from_millis(0),
        use_puppeteer: false,
        robots_user_agent: "ScrapeCoreBot/1.0".into(),
        content_max_age_days: 90,
        auto_scrape_enabled: false,
        scrape_cron_schedule: "0 0 */6 * * *".into(),
        proxy: None,
        log_level: "info".into(),
        domain_profiles: HashMap::new(),
        default_domain_profile: DomainProfile::new(100.0, 1000.0, 0, 0),
    })
}

async fn allow_all_robots(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow:\n"))
        .mount(server)
        .await;
}

fn rss_with_items(server_uri: &str, items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, slug)| {
            format!(
                "<item><title>{title}</title><link>{server_uri}/{slug}</link><description>webmethods item</description></item>"
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Feed</title>{body}</channel></rss>"#)
}

#[tokio::test]
async fn happy_path_single_adapter_inserts_one_relevant_item() {
    let docker = Cli::default();
    let env = Env::new(&docker).await;
    let server = MockServer::start().await;
    allow_all_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_with_items(
            &server.uri(),
            &[("webMethods X release notes", "a"), ("Unrelated announcement", "b")],
        )))
        .mount(&server)
        .await;

    let adapter = NewsFeedAdapter::new(
        "news",
        "Example News",
        vec![format!("{}/feed.xml", server.uri())],
        RelevanceFilter::new(vec!["webmethods".to_string()]),
    );

    let scraper = Arc::new(Scraper::new(
        test_config(),
        env.fetcher.clone(),
        env.robots.clone(),
        env.limiter.clone(),
        env.gate.clone(),
        env.content_store.clone(),
        env.run_logs.clone(),
        vec![Arc::new(adapter)],
    ));

    scraper.start_all(TriggerSource::Manual, None).await.unwrap();

    let status = scraper.status().await;
    assert!(!status.is_running);
    assert_eq!(status.counters.total_inserted, 1);

    let entry = status.adapters.get("news").unwrap();
    assert_eq!(entry.status, RunStatus::Completed);
}

#[tokio::test]
async fn robots_deny_yields_zero_records_and_a_warning() {
    let docker = Cli::default();
    let env = Env::new(&docker).await;
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;

    let adapter = NewsFeedAdapter::new(
        "news",
        "Example News",
        vec![format!("{}/feed.xml", server.uri())],
        RelevanceFilter::new(vec!["webmethods".to_string()]),
    );

    let scraper = Arc::new(Scraper::new(
        test_config(),
        env.fetcher.clone(),
        env.robots.clone(),
        env.limiter.clone(),
        env.gate.clone(),
        env.content_store.clone(),
        env.run_logs.clone(),
        vec![Arc::new(adapter)],
    ));

    scraper.start_all(TriggerSource::Manual, None).await.unwrap();

    let status = scraper.status().await;
    assert_eq!(status.counters.total_inserted, 0);

    let (logs, _) = env
        .run_logs
        .list(&scrapecore_store::RunLogListQuery {
            page: 1,
            limit: 1,
            scraper_name: Some("news".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let log = logs.first().unwrap();
    assert!(!log.warnings.is_empty());
    assert!(log.results.urls_failed >= 1);
}

#[tokio::test]
async fn starting_twice_is_rejected_with_already_running() {
    let docker = Cli::default();
    let env = Env::new(&docker).await;
    let server = MockServer::start().await;
    allow_all_robots(&server).await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)).set_body_string(rss_with_items(&server.uri(), &[])))
        .mount(&server)
        .await;

    let adapter = NewsFeedAdapter::new(
        "news",
        "Example News",
        vec![format!("{}/feed.xml", server.uri())],
        RelevanceFilter::default(),
    );

    let scraper = Arc::new(Scraper::new(
        test_config(),
        env.fetcher.clone(),
        env.robots.clone(),
        env.limiter.clone(),
        env.gate.clone(),
        env.content_store.clone(),
        env.run_logs.clone(),
        vec![Arc::new(adapter)],
    ));

    let first = {
        let scraper = scraper.clone();
        tokio::spawn(async move { scraper.start_all(TriggerSource::Manual, None).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = scraper.start_specific("news", TriggerSource::Api, None).await;

    assert!(matches!(second, Err(scrapecore_types::ScrapeError::AlreadyRunning)));
    first.await.unwrap().unwrap();
}
