//! Shared fixtures for the integration tests

use feedline::config::{Config, FeedConfig};
use feedline::storage::{SourceRecord, SqliteStorage, Storage, SOURCE_TYPE_RSS};
use feedline::Collector;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A configuration suited to mock servers
///
/// Every mock server lives on 127.0.0.1, which is a single rate-limit
/// domain, so pacing is effectively disabled and retries are off.
pub fn test_config(feeds: Vec<FeedConfig>) -> Config {
    let mut config = Config::default();
    config.settings.user_agent = "feedline-test/1.0".to_string();
    config.settings.request_timeout_seconds = 5;
    config.collector.requests_per_second = 1000.0;
    config.collector.max_retries = 0;
    config.feeds = feeds;
    config
}

pub fn collector(config: Config) -> Collector {
    Collector::from_config(config, SqliteStorage::new_in_memory().unwrap()).unwrap()
}

/// RSS 2.0 document with one undated `<item>` per `(path, title, description)`
pub fn rss(base: &str, items: &[(&str, &str, &str)]) -> String {
    rss_document(base, items, None)
}

/// Like [`rss`], with every item carrying `pub_date` (RFC 2822)
pub fn rss_published(base: &str, items: &[(&str, &str, &str)], pub_date: &str) -> String {
    rss_document(base, items, Some(pub_date))
}

fn rss_document(base: &str, items: &[(&str, &str, &str)], pub_date: Option<&str>) -> String {
    let mut body = String::new();
    for (item_path, title, description) in items {
        body.push_str(&format!(
            "<item><title>{title}</title><link>{base}{item_path}</link>\
             <description>{description}</description>"
        ));
        if let Some(date) = pub_date {
            body.push_str(&format!("<pubDate>{date}</pubDate>"));
        }
        body.push_str("</item>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Test Wire</title><link>{base}</link>
<description>Test feed</description><language>en</language>{body}</channel></rss>"#
    )
}

pub fn article(text: &str) -> String {
    format!(
        "<html><head><title>x</title><script>var tracking = 1;</script></head>\
         <body><nav>Home | World</nav><article><h1>Headline</h1><p>{text}</p></article>\
         <footer>Copyright</footer></body></html>"
    )
}

pub async fn mount_feed(server: &MockServer, feed_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(feed_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

pub async fn mount_article(server: &MockServer, article_path: &str, text: &str) {
    Mock::given(method("GET"))
        .and(path(article_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article(text))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

pub fn source(collector: &Collector, url: &str) -> SourceRecord {
    let storage = collector.storage();
    let storage = storage.lock().unwrap();
    storage
        .get_source_by_url(SOURCE_TYPE_RSS, url)
        .unwrap()
        .expect("source row should exist")
}
