use std::fs;

use skiff_core::version::VersionCache;
use skiff_core::version::cache::now_epoch_ms;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[tokio::test]
async fn missing_file_is_no_cache() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let cache = VersionCache::in_dir(tmp.path());

    assert_eq!(cache.get_cached_update().await, None);
    assert!(!cache.is_cache_valid().await);
}

#[tokio::test]
async fn ttl_boundary_at_one_millisecond() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let cache = VersionCache::in_dir(tmp.path());
    let checked_at = 1_700_000_000_000;
    cache
        .write_entry(Some("2.0.0".into()), checked_at)
        .await
        .expect("write_entry should succeed");

    assert!(cache.is_cache_valid_at(checked_at + DAY_MS - 1).await);
    assert!(!cache.is_cache_valid_at(checked_at + DAY_MS).await);
    assert!(!cache.is_cache_valid_at(checked_at + DAY_MS + 1).await);
}

#[tokio::test]
async fn malformed_file_is_ignored() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let cache = VersionCache::in_dir(tmp.path());

    for content in [
        "not json",
        "{\"latestVersion\": \"1.0.0\"}",
        "{\"lastUpdateCheck\": \"yesterday\", \"latestVersion\": null}",
        "[]",
    ] {
        fs::write(cache.path(), content).expect("write should succeed");
        assert_eq!(cache.get_cached_update().await, None, "content: {content}");
        assert!(!cache.is_cache_valid().await);
    }
}

#[tokio::test]
async fn set_creates_parent_and_reads_back() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let cache = VersionCache::in_dir(&tmp.path().join("nested").join("skiff"));

    cache.set_cached_update(Some("3.1.4".into())).await;

    let entry = cache.get_cached_update().await.expect("entry should exist");
    assert_eq!(entry.latest_version.as_deref(), Some("3.1.4"));
    assert!(now_epoch_ms() - entry.last_checked_at_epoch_ms < DAY_MS);
    assert!(cache.is_cache_valid().await);

    let raw: serde_json::Value =
        serde_json::from_slice(&fs::read(cache.path()).expect("read should succeed"))
            .expect("cache file should be valid JSON");
    assert_eq!(raw["latestVersion"], "3.1.4");
    assert!(raw["lastUpdateCheck"].is_i64());
}

#[tokio::test]
async fn null_latest_version_round_trips() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let cache = VersionCache::in_dir(tmp.path());
    cache.set_cached_update(None).await;

    let entry = cache.get_cached_update().await.expect("entry should exist");
    assert_eq!(entry.latest_version, None);
}

#[cfg(unix)]
#[tokio::test]
async fn unwritable_location_is_swallowed() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "a file, not a directory").expect("write should succeed");
    let cache = VersionCache::in_dir(&blocker.join("skiff"));

    cache.set_cached_update(Some("1.0.0".into())).await;
    assert_eq!(cache.get_cached_update().await, None);
}

#[tokio::test]
async fn background_store_completes() {
    let tmp = tempfile::tempdir().expect("tempdir should succeed");
    let cache = VersionCache::in_dir(tmp.path());

    cache
        .store_in_background(Some("1.2.3".into()))
        .expect("runtime should be available")
        .await
        .expect("store task should not panic");
    assert_eq!(
        cache.get_cached_update().await.and_then(|e| e.latest_version).as_deref(),
        Some("1.2.3")
    );
}
