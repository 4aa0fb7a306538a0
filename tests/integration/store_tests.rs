use super::*;
use prisbevakaren::store::json_file;
use prisbevakaren::StoreSnapshot;

#[tokio::test]
async fn test_duplicate_url_in_group_is_rejected() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Verktyg").await?;
    harness.store.add_url(group.id, "https://www.jula.se/catalog/a", None).await?;

    let err = harness
        .store
        .add_url(group.id, "https://www.jula.se/catalog/a", Some(10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEntry { .. }));
    assert_eq!(harness.store.load().await?.urls.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_crash_before_rename_keeps_previous_state() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Mat").await?;
    harness.store.add_url(group.id, "https://www.willys.se/produkt/a", None).await?;
    let before = harness.store.load().await?;

    let mut next = before.clone();
    next.add_url(group.id, "https://www.willys.se/produkt/b", None)?;
    let staged = json_file::stage(harness.store.urls_path(), &next.urls).await?;
    // The process dies after the temp file is synced but before the rename.
    std::mem::forget(staged);

    let after = harness.store.load().await?;
    assert_eq!(after, before);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_store_fails_the_run() -> anyhow::Result<()> {
    let harness = Harness::new();
    std::fs::write(harness.store.groups_path(), "[{\"id\": \"not-a-uuid\", \"name\": 5}]")?;

    let err = harness.orchestrator().run_update().await.unwrap_err();
    assert!(matches!(err, AppError::CorruptStore { .. }));
    assert!(err.is_fatal_store_error());
    // The damaged file is not replaced.
    assert_eq!(
        std::fs::read_to_string(harness.store.groups_path())?,
        "[{\"id\": \"not-a-uuid\", \"name\": 5}]"
    );
    assert!(harness.transport.texts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_busy_store_fails_the_run() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Verktyg").await?;
    let entry = harness.store.add_url(group.id, "https://www.jula.se/catalog/a", None).await?;
    harness.fetcher.serve(&entry.url, &jula_page("10:-"));

    let _held = harness.store.lock().await?;
    let err = harness.orchestrator().run_update().await.unwrap_err();
    assert!(matches!(err, AppError::StoreBusy { .. }));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_writers_do_not_lose_updates() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = JsonStore::new(&StoreConfig {
        data_dir: dir.path().to_path_buf(),
        lock_timeout_ms: 10_000,
        ..StoreConfig::default()
    });
    let group = store.add_group("Verktyg").await?;

    let writers = (0..8).map(|i| {
        let store = store.clone();
        async move {
            store
                .add_url(group.id, &format!("https://www.jula.se/catalog/{}", i), None)
                .await
        }
    });
    futures::future::try_join_all(writers).await?;

    let snapshot = store.load().await?;
    assert_eq!(snapshot.urls.len(), 8);
    assert!(!store.lock_path().exists());
    Ok(())
}

#[tokio::test]
async fn test_save_replaces_snapshot() -> anyhow::Result<()> {
    let harness = Harness::new();
    let mut snapshot = StoreSnapshot::default();
    let group = snapshot.add_group("Present")?;
    snapshot.add_url(group.id, "https://shop.example/lego", Some(499.0))?;

    harness.store.save(&snapshot).await?;
    assert_eq!(harness.store.load().await?, snapshot);

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(harness.store.urls_path())?)?;
    assert_eq!(raw[0]["url"], "https://shop.example/lego");
    assert_eq!(raw[0]["target_price"], 499.0);
    assert_eq!(raw[0]["history"], serde_json::json!([]));
    Ok(())
}
