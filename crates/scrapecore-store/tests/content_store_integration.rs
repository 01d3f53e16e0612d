mod helpers;

use chrono::Utc;
use helpers::TestStore;
use scrapecore_types::{ContentCategory, ContentRecord, ContentStatus};
use std::collections::BTreeSet;
use testcontainers::clients::Cli;

fn record(url: &str, title: &str) -> ContentRecord {
    let now = Utc::now();
    ContentRecord {
        content_hash: ContentRecord::compute_hash(url, title),
        category: ContentCategory::News,
        url: url.to_string(),
        title: title.to_string(),
        description: Some("a test record".to_string()),
        body: None,
        image_url: None,
        author: None,
        published_at: Some(now),
        source_host: "example.com".to_string(),
        source_name: "Example Feed".to_string(),
        tags: BTreeSet::from(["news".to_string(), "webmethods".to_string()]),
        keyword_hits: BTreeSet::from(["webmethods".to_string()]),
        relevance_score: 55,
        job_detail: None,
        scraped_by: "news-feed".to_string(),
        scraped_at: now,
        expires_at: None,
        status: ContentStatus::Active,
        view_count: 0,
        click_count: 0,
        updated_at: now,
    }
}

#[tokio::test]
async fn fresh_record_is_inserted() {
    let docker = Cli::default();
    let test_store = TestStore::new(&docker).await;

    let result = test_store
        .store
        .bulk_upsert(&[record("https://example.com/a", "A webMethods guide")], 90)
        .await
        .unwrap();

    assert_eq!(result.inserted, 1);
    assert_eq!(result.modified, 0);
    assert_eq!(result.duplicates, 0);
}

#[tokio::test]
async fn identical_second_upsert_is_a_duplicate() {
    let docker = Cli::default();
    let test_store = TestStore::new(&docker).await;
    let item = record("https://example.com/a", "A webMethods guide");

    test_store.store.bulk_upsert(&[item.clone()], 90).await.unwrap();
    let second = test_store.store.bulk_upsert(&[item], 90).await.unwrap();

    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 1);
}

#[tokio::test]
async fn changed_description_is_modified_not_duplicate() {
    let docker = Cli::default();
    let test_store = TestStore::new(&docker).await;
    let mut item = record("https://example.com/a", "A webMethods guide");

    test_store.store.bulk_upsert(&[item.clone()], 90).await.unwrap();
    item.description = Some("an updated description".to_string());
    let second = test_store.store.bulk_upsert(&[item], 90).await.unwrap();

    assert_eq!(second.modified, 1);
    assert_eq!(second.duplicates, 0);
}

#[tokio::test]
async fn cleanup_never_deletes_flagged_records_regardless_of_age() {
    let docker = Cli::default();
    let test_store = TestStore::new(&docker).await;
    let mut item = record("https://example.com/old", "An old webMethods post");
    item.status = ContentStatus::Flagged;
    item.scraped_at = Utc::now() - chrono::Duration::days(365);

    test_store.store.bulk_upsert(&[item.clone()], 90).await.unwrap();
    test_store.store.cleanup(1).await.unwrap();

    let fetched = test_store.store.get(&item.content_hash).await.unwrap();
    assert!(fetched.is_some());
}

#[tokio::test]
async fn bulk_upsert_sets_expires_at_from_retention() {
    let docker = Cli::default();
    let test_store = TestStore::new(&docker).await;
    let item = record("https://example.com/a", "A webMethods guide");

    test_store.store.bulk_upsert(&[item.clone()], 90).await.unwrap();

    let fetched = test_store.store.get(&item.content_hash).await.unwrap().unwrap();
    let expires_at = fetched.expires_at.expect("expires_at set at insertion");
    let expected = fetched.scraped_at + chrono::Duration::days(90);
    assert!((expires_at - expected).num_seconds().abs() < 5);
}

#[tokio::test]
async fn expire_ttl_deletes_past_expiry_but_spares_flagged() {
    let docker = Cli::default();
    let test_store = TestStore::new(&docker).await;

    let mut expired = record("https://example.com/expired", "An expired webMethods post");
    expired.expires_at = Some(Utc::now() - chrono::Duration::days(1));
    let mut flagged_expired = record("https://example.com/flagged", "A flagged webMethods post");
    flagged_expired.status = ContentStatus::Flagged;
    flagged_expired.expires_at = Some(Utc::now() - chrono::Duration::days(1));

    test_store.store.bulk_upsert(&[expired.clone(), flagged_expired.clone()], 90).await.unwrap();
    let deleted = test_store.store.expire_ttl().await.unwrap();

    assert_eq!(deleted, 1);
    assert!(test_store.store.get(&expired.content_hash).await.unwrap().is_none());
    assert!(test_store.store.get(&flagged_expired.content_hash).await.unwrap().is_some());
}

#[tokio::test]
async fn search_ranks_title_hits_above_body_only_hits() {
    let docker = Cli::default();
    let test_store = TestStore::new(&docker).await;

    let mut title_hit = record("https://example.com/a", "webmethods integration guide");
    title_hit.body = Some("nothing special here".to_string());
    let mut body_hit = record("https://example.com/b", "Unrelated announcement");
    body_hit.body = Some("this article mentions webmethods once in passing".to_string());

    test_store.store.bulk_upsert(&[title_hit.clone(), body_hit.clone()], 90).await.unwrap();

    let (results, total) = test_store
        .store
        .list(&scrapecore_store::ContentListQuery {
            page: 1,
            limit: 10,
            search: Some("webmethods".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(total, 2);
    assert_eq!(results[0].content_hash, title_hit.content_hash);
}
