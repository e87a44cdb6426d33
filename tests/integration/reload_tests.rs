//! Configuration hot reload between collection batches

use crate::support::{mount_article, mount_feed, rss};
use feedline::config::ConfigStore;
use feedline::storage::SqliteStorage;
use feedline::Collector;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiremock::MockServer;

fn config_document(db_path: &Path, feeds: &[(&str, String)]) -> String {
    let mut doc = format!(
        r#"version = 1

[settings]
user-agent = "feedline-test/1.0"
request-timeout-seconds = 5

[collector]
database-path = "{}"
requests-per-second = 1000.0
max-retries = 0
"#,
        db_path.display()
    );
    for (name, url) in feeds {
        doc.push_str(&format!(
            "\n[[feeds]]\nname = \"{}\"\nurl = \"{}\"\n",
            name, url
        ));
    }
    doc
}

#[tokio::test]
async fn test_reload_picks_up_new_feeds_and_survives_bad_edits() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(&server, "/a.xml", rss(&base, &[("/a/1", "A1", "Summary A1")])).await;
    mount_feed(&server, "/b.xml", rss(&base, &[("/b/1", "B1", "Summary B1")])).await;
    mount_article(&server, "/a/1", "Body of A1.").await;
    mount_article(&server, "/b/1", "Body of B1.").await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("feedline.db");
    let config_path = dir.path().join("feedline.toml");
    fs::write(
        &config_path,
        config_document(&db_path, &[("Alpha", format!("{}/a.xml", base))]),
    )
    .unwrap();

    let store = ConfigStore::load(&config_path).unwrap();
    let first_hash = store.hash().unwrap().to_string();
    let storage = SqliteStorage::new(&db_path).unwrap();
    let mut collector = Collector::new(store, storage).unwrap();

    let results = collector.collect_all().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].items_stored, 1);

    fs::write(
        &config_path,
        config_document(
            &db_path,
            &[
                ("Alpha", format!("{}/a.xml", base)),
                ("Beta", format!("{}/b.xml", base)),
            ],
        ),
    )
    .unwrap();

    let results = collector.collect_all().await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].feed_name, "Alpha");
    assert_eq!(results[0].items_stored, 0);
    assert_eq!(results[1].feed_name, "Beta");
    assert_eq!(results[1].items_stored, 1);
    assert_ne!(collector.config_store().hash(), Some(first_hash.as_str()));
    assert_eq!(collector.config_store().generation(), 2);

    fs::write(&config_path, "version = 1\n[[feeds]]\nname = \"\"\nurl = \"nope\"\nbroken").unwrap();

    assert!(collector.collect_all().await.is_err());
    assert_eq!(collector.config().feeds.len(), 2);
    assert_eq!(collector.config_store().generation(), 2);

    // The broken file keeps failing to reload, yet batches still run on the
    // previous configuration
    assert!(collector.reload_config().is_err());
    let results = collector.collect_enabled().await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(results[0].items_skipped, 1);
    assert_eq!(results[1].items_skipped, 1);

    let beta = collector.collect_by_name("Beta").await.unwrap();
    assert!(beta.is_success());
}

#[tokio::test]
async fn test_collected_items_persist_across_collectors() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_feed(&server, "/a.xml", rss(&base, &[("/a/1", "A1", "Summary A1")])).await;
    mount_article(&server, "/a/1", "Body of A1.").await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("feedline.db");
    let config_path = dir.path().join("feedline.toml");
    fs::write(
        &config_path,
        config_document(&db_path, &[("Alpha", format!("{}/a.xml", base))]),
    )
    .unwrap();

    let mut first = Collector::new(
        ConfigStore::load(&config_path).unwrap(),
        SqliteStorage::new(&db_path).unwrap(),
    )
    .unwrap();
    assert_eq!(first.collect_all().await.unwrap()[0].items_stored, 1);
    drop(first);

    // A restarted process resumes from the persisted watermark
    let mut second = Collector::new(
        ConfigStore::load(&config_path).unwrap(),
        SqliteStorage::new(&db_path).unwrap(),
    )
    .unwrap();
    let result = second.collect_all().await.unwrap().remove(0);
    assert_eq!(result.items_stored, 0);
    assert_eq!(result.items_skipped, 1);
    assert_eq!(result.overlap_seconds, 300);
}
