//! End-to-end collection runs against mock feeds

use crate::support::{
    collector, mount_article, mount_feed, rss, rss_published, source, test_config,
};
use chrono::{Duration as ChronoDuration, Utc};
use feedline::collector::FailureKind;
use feedline::config::FeedConfig;
use feedline::state::ItemStatus;
use feedline::storage::{SqliteStorage, Storage};
use feedline::Collector;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_single_entry_then_idempotent_rerun() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss_published(
            &base,
            &[("/news/one?utm_source=rss", "First story", "Short summary")],
            "Mon, 06 Jan 2025 10:00:00 GMT",
        ),
    )
    .await;
    mount_article(&server, "/news/one", "The full body of the first story.").await;

    let feed_url = format!("{}/feed.xml", base);
    let mut feed = FeedConfig::new("Wire", &feed_url);
    feed.language = Some("de".to_string());
    let mut collector = collector(test_config(vec![feed]));

    let results = collector.collect_all().await.unwrap();
    assert_eq!(results.len(), 1);
    let first = &results[0];
    assert!(first.is_success(), "errors: {:?}", first.errors);
    assert_eq!(first.items_fetched, 1);
    assert_eq!(first.items_stored, 1);
    assert_eq!(first.items_skipped, 0);
    assert!(first.errors.is_empty());

    let source_row = source(&collector, &feed_url);
    let item_url = format!("{}/news/one", base);
    {
        let storage = collector.storage();
        let storage = storage.lock().unwrap();
        let item = storage
            .get_raw_item_by_external_id(source_row.id, &item_url)
            .unwrap()
            .expect("item should be stored under its normalized URL");
        assert_eq!(item.url, item_url);
        assert_eq!(item.title.as_deref(), Some("First story"));
        assert!(item.raw_content.contains("The full body of the first story."));
        assert!(!item.raw_content.contains("tracking"));
        assert!(!item.raw_content.contains("Copyright"));
        assert_eq!(item.content_hash.len(), 64);
        assert_eq!(item.language.as_deref(), Some("de"));
        assert_eq!(item.processing_status, ItemStatus::Pending);
        assert!(item.published_at.is_some());
    }

    let results = collector.collect_all().await.unwrap();
    let second = &results[0];
    assert!(second.is_success());
    assert_eq!(second.items_fetched, 1);
    assert_eq!(second.items_stored, 0);
    assert_eq!(second.items_skipped, 1);
    assert!(second.errors.is_empty());

    let storage = collector.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_raw_items().unwrap(), 1);
}

#[tokio::test]
async fn test_summary_fallback_when_article_missing() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss(
            &base,
            &[("/gone", "Gone story", "<p>Summary <b>text</b> only</p>")],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed.xml", base);
    let mut collector = collector(test_config(vec![FeedConfig::new("Wire", &feed_url)]));

    let result = collector.collect_named("Wire").await.unwrap();
    assert!(result.is_success());
    assert_eq!(result.items_stored, 1);

    let source_row = source(&collector, &feed_url);
    let storage = collector.storage();
    let storage = storage.lock().unwrap();
    let item = storage
        .get_raw_item_by_external_id(source_row.id, &format!("{}/gone", base))
        .unwrap()
        .unwrap();
    assert_eq!(item.raw_content, "Summary text only");
    // Feed-level language applies when the feed config sets none
    assert_eq!(item.language.as_deref(), Some("en"));
}

#[tokio::test]
async fn test_failing_feed_does_not_affect_others() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_feed(
        &server,
        "/good.xml",
        rss(&base, &[("/story", "Good story", "Good summary")]),
    )
    .await;
    mount_article(&server, "/story", "A story that still gets collected.").await;

    let bad_url = format!("{}/missing.xml", base);
    let good_url = format!("{}/good.xml", base);
    let mut collector = collector(test_config(vec![
        FeedConfig::new("Broken", &bad_url),
        FeedConfig::new("Healthy", &good_url),
    ]));

    let results = collector.collect_all().await.unwrap();
    assert_eq!(results.len(), 2);

    let broken = &results[0];
    assert_eq!(broken.feed_name, "Broken");
    assert_eq!(broken.failure, Some(FailureKind::Terminal));
    assert_eq!(broken.items_stored, 0);
    assert_eq!(broken.terminal_errors, 1);
    assert!(broken.errors[0].starts_with("[terminal]"));

    let healthy = &results[1];
    assert_eq!(healthy.feed_name, "Healthy");
    assert!(healthy.is_success());
    assert_eq!(healthy.items_stored, 1);

    let broken_source = source(&collector, &bad_url);
    assert_eq!(broken_source.error_count, 1);
    assert!(broken_source.ingestion_window_end_at.is_none());
    assert!(broken_source.last_error.unwrap().contains("404"));

    let healthy_source = source(&collector, &good_url);
    assert_eq!(healthy_source.error_count, 0);
    assert!(healthy_source.ingestion_window_end_at.is_some());
}

#[tokio::test]
async fn test_server_error_is_transient_and_recovery_resets_errors() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_feed(
        &server,
        "/feed.xml",
        rss(&base, &[("/later", "Later story", "Later summary")]),
    )
    .await;
    mount_article(&server, "/later", "Recovered article body.").await;

    let feed_url = format!("{}/feed.xml", base);
    let mut collector = collector(test_config(vec![FeedConfig::new("Flaky", &feed_url)]));

    for expected_errors in 1..=2 {
        let result = collector.collect_all().await.unwrap().remove(0);
        assert_eq!(result.failure, Some(FailureKind::Transient));
        assert!(result.errors[0].starts_with("[transient]"));

        let row = source(&collector, &feed_url);
        assert_eq!(row.error_count, expected_errors);
        assert!(row.ingestion_window_end_at.is_none());
    }

    let result = collector.collect_all().await.unwrap().remove(0);
    assert!(result.is_success());
    assert_eq!(result.items_stored, 1);

    let row = source(&collector, &feed_url);
    assert_eq!(row.error_count, 0);
    assert!(row.last_error.is_none());
    assert!(row.last_fetched_at.is_some());
    // Timestamps are persisted with microsecond precision
    assert_eq!(
        row.ingestion_window_end_at.map(|t| t.timestamp_micros()),
        result.window_end.map(|t| t.timestamp_micros())
    );
}

#[tokio::test]
async fn test_watermark_advances_and_overlap_is_reported() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss(&base, &[("/a", "A", "Summary A")]),
    )
    .await;
    mount_article(&server, "/a", "Article A body.").await;

    let feed_url = format!("{}/feed.xml", base);
    let mut config = test_config(vec![FeedConfig::new("Wire", &feed_url)]);
    config.settings.default_lookback_hours = 6;
    config.collector.overlap_seconds = 120;
    let mut collector = collector(config);

    let first = collector.collect_all().await.unwrap().remove(0);
    assert!(first.is_success());
    let first_end = first.window_end.unwrap();
    assert_eq!(first.expected_start, first.actual_start);
    assert_eq!(
        first_end - first.expected_start.unwrap(),
        ChronoDuration::hours(6)
    );
    assert_eq!(first.gap_seconds, 0);
    assert_eq!(first.overlap_seconds, 0);

    let second = collector.collect_all().await.unwrap().remove(0);
    assert!(second.is_success());
    assert_eq!(
        second.expected_start.map(|t| t.timestamp_micros()),
        Some(first_end.timestamp_micros())
    );
    assert_eq!(second.overlap_seconds, 120);
    assert_eq!(second.gap_seconds, 0);

    let watermark = source(&collector, &feed_url).ingestion_window_end_at.unwrap();
    assert!(watermark.timestamp_micros() >= first_end.timestamp_micros());
    assert_eq!(
        Some(watermark.timestamp_micros()),
        second.window_end.map(|t| t.timestamp_micros())
    );
}

#[tokio::test]
async fn test_observed_timestamps_drive_gap_and_overlap() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/old.xml",
        rss_published(
            &base,
            &[("/old", "Old", "Old summary")],
            "Mon, 06 Jan 2025 10:00:00 GMT",
        ),
    )
    .await;
    let recent = (Utc::now() - ChronoDuration::hours(1)).to_rfc2822();
    mount_feed(
        &server,
        "/recent.xml",
        rss_published(&base, &[("/recent", "Recent", "Recent summary")], &recent),
    )
    .await;
    mount_article(&server, "/old", "An old article.").await;
    mount_article(&server, "/recent", "A recent article.").await;

    let mut config = test_config(vec![
        FeedConfig::new("Old", format!("{}/old.xml", base)),
        FeedConfig::new("Recent", format!("{}/recent.xml", base)),
    ]);
    config.settings.default_lookback_hours = 6;
    let mut collector = collector(config);

    let results = collector.collect_all().await.unwrap();

    // An entry published before the expected start is overlap
    let old = &results[0];
    assert!(old.is_success());
    let published = chrono::DateTime::parse_from_rfc2822("Mon, 06 Jan 2025 10:00:00 GMT")
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(old.actual_start, Some(published));
    assert_eq!(old.gap_seconds, 0);
    assert_eq!(
        old.overlap_seconds,
        (old.expected_start.unwrap() - published).num_seconds()
    );

    // The earliest entry is an hour old while six hours were expected: a gap
    let recent = &results[1];
    assert!(recent.is_success());
    assert_eq!(recent.overlap_seconds, 0);
    let five_hours = ChronoDuration::hours(5).num_seconds();
    assert!((recent.gap_seconds - five_hours).abs() <= 60);
}

#[tokio::test]
async fn test_feed_timeout_keeps_committed_items() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss(
            &base,
            &[("/t/1", "Fast", "Fast summary"), ("/t/2", "Slow", "Slow summary")],
        ),
    )
    .await;
    mount_article(&server, "/t/1", "Arrives in time.").await;
    Mock::given(method("GET"))
        .and(path("/t/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(crate::support::article("Arrives too late."))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed.xml", base);
    let mut config = test_config(vec![FeedConfig::new("Wire", &feed_url)]);
    config.collector.feed_timeout_seconds = 1;
    let mut collector = collector(config);

    let result = collector.collect_all().await.unwrap().remove(0);
    assert_eq!(result.failure, Some(FailureKind::Transient));
    assert_eq!(result.items_stored, 1);

    let row = source(&collector, &feed_url);
    assert!(row.ingestion_window_end_at.is_none());
    assert_eq!(row.error_count, 1);

    let storage = collector.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_raw_items().unwrap(), 1);
    assert!(storage
        .get_raw_item_by_external_id(row.id, &format!("{}/t/1", base))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_entry_error_does_not_stop_the_feed() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss(
            &base,
            &[
                ("/e/1", "One", "First summary"),
                ("/e/bad", "Bad", "Rejected summary"),
                ("/e/3", "Three", "Third summary"),
            ],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("feedline.db");
    let storage = SqliteStorage::new(&db_path).unwrap();
    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_bad_items BEFORE INSERT ON raw_items
             WHEN NEW.url LIKE '%/e/bad'
             BEGIN SELECT RAISE(ABORT, 'item rejected'); END;",
        )
        .unwrap();
    }

    let feed_url = format!("{}/feed.xml", base);
    let config = test_config(vec![FeedConfig::new("Wire", &feed_url)]);
    let mut collector = Collector::from_config(config, storage).unwrap();

    let result = collector.collect_all().await.unwrap().remove(0);
    assert!(result.is_success());
    assert_eq!(result.items_fetched, 3);
    assert_eq!(result.items_stored, 2);
    assert_eq!(result.items_skipped, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("/e/bad"));

    let row = source(&collector, &feed_url);
    assert_eq!(row.error_count, 0);
    assert!(row.ingestion_window_end_at.is_some());
}

#[tokio::test]
async fn test_insert_conflict_is_a_skip_when_dedup_window_disabled() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss(&base, &[("/same", "Same", "Same summary")]),
    )
    .await;
    mount_article(&server, "/same", "Same article body.").await;

    let feed_url = format!("{}/feed.xml", base);
    let mut config = test_config(vec![FeedConfig::new("Wire", &feed_url)]);
    config.collector.dedup_window_days = 0;
    let mut collector = collector(config);

    let first = collector.collect_all().await.unwrap().remove(0);
    assert_eq!(first.items_stored, 1);

    let second = collector.collect_all().await.unwrap().remove(0);
    assert!(second.is_success());
    assert_eq!(second.items_stored, 0);
    assert_eq!(second.items_skipped, 1);
    assert!(second.errors.is_empty());
}

#[tokio::test]
async fn test_duplicate_content_across_sources_is_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(
        &server,
        "/one.xml",
        rss(&base, &[("/one/story", "Story", "Syndicated summary")]),
    )
    .await;
    mount_feed(
        &server,
        "/two.xml",
        rss(&base, &[("/two/story", "Story", "Syndicated summary")]),
    )
    .await;
    mount_article(&server, "/one/story", "Syndicated wire copy.").await;
    mount_article(&server, "/two/story", "Syndicated wire copy.").await;

    let mut config = test_config(vec![
        FeedConfig::new("One", format!("{}/one.xml", base)),
        FeedConfig::new("Two", format!("{}/two.xml", base)),
    ]);
    config.collector.max_concurrent_feeds = 1;
    let mut collector = collector(config);

    let results = collector.collect_all().await.unwrap();
    assert_eq!(results[0].items_stored, 1);
    assert_eq!(results[1].items_stored, 0);
    assert_eq!(results[1].items_skipped, 1);
}

#[tokio::test]
async fn test_per_feed_cap_and_missing_links() {
    let server = MockServer::start().await;
    let base = server.uri();
    let body = format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Capped</title><link>{base}</link><description>d</description>
<item><title>No link here</title><description>orphan</description></item>
<item><title>One</title><link>{base}/1</link><description>First</description></item>
<item><title>Two</title><link>{base}/2</link><description>Second</description></item>
<item><title>Three</title><link>{base}/3</link><description>Third</description></item>
</channel></rss>"#
    );
    mount_feed(&server, "/feed.xml", body).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut feed = FeedConfig::new("Capped", format!("{}/feed.xml", base));
    feed.max_items = Some(3);
    let mut collector = collector(test_config(vec![feed]));

    let result = collector.collect_all().await.unwrap().remove(0);
    assert!(result.is_success());
    assert_eq!(result.items_fetched, 3);
    assert_eq!(result.items_stored, 2);
    assert_eq!(result.items_skipped, 1);

    let storage = collector.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_raw_items().unwrap(), 2);
}

#[tokio::test]
async fn test_malformed_feed_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not a feed at all"))
        .mount(&server)
        .await;

    let feed_url = format!("{}/feed.xml", server.uri());
    let mut collector = collector(test_config(vec![FeedConfig::new("Junk", &feed_url)]));

    let result = collector.collect_all().await.unwrap().remove(0);
    assert_eq!(result.failure, Some(FailureKind::Terminal));
    assert_eq!(result.items_fetched, 0);

    let row = source(&collector, &feed_url);
    assert_eq!(row.error_count, 1);
    assert!(row.last_error.unwrap().contains("Malformed feed"));
}

#[tokio::test]
async fn test_feed_timeout_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&server.uri(), &[]))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let feed_url = format!("{}/slow.xml", server.uri());
    let mut config = test_config(vec![FeedConfig::new("Slow", &feed_url)]);
    config.collector.feed_timeout_seconds = 1;
    let mut collector = collector(config);

    let result = collector.collect_all().await.unwrap().remove(0);
    assert_eq!(result.failure, Some(FailureKind::Transient));
    assert!(result.errors[0].contains("timed out"));
    assert!(source(&collector, &feed_url).ingestion_window_end_at.is_none());
}

#[tokio::test]
async fn test_unknown_feed_name_is_rejected() {
    let mut collector = collector(test_config(vec![]));
    assert!(collector.collect_named("nope").await.is_err());
}
