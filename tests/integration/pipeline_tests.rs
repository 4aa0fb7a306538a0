use super::*;
use chrono::Duration;
use prisbevakaren::models::PricePoint;
use prisbevakaren::FailureKind;

#[tokio::test]
async fn test_willys_price_drop_reaches_target() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Mat").await?;
    let url = "https://www.willys.se/produkt/kaffe-101233933_ST";
    let entry = harness.store.add_url(group.id, url, Some(90.0)).await?;

    // Seed a previous observation of 99.00.
    let seeded_at = test_time() - Duration::days(1);
    harness
        .store
        .update(|snapshot| {
            let entry = snapshot.entry_mut(entry.id).expect("entry exists");
            entry.record_price(99.0, seeded_at);
            Ok(())
        })
        .await?;

    harness.fetcher.serve(url, &willys_page("89", "00"));
    let report = harness.orchestrator().run_update().await?;

    assert_eq!(report.processed_count, 1);
    assert_eq!(report.succeeded_count, 1);
    assert_eq!(report.changed_count, 1);
    assert!(report.failures.is_empty());
    assert_eq!(report.on_target, vec![entry.id]);

    let snapshot = harness.store.load().await?;
    let stored = snapshot.entry(entry.id).expect("entry persisted");
    assert_eq!(stored.current_price, Some(89.0));
    assert_eq!(
        stored.history,
        vec![PricePoint::new(99.0, seeded_at), PricePoint::new(89.0, test_time())]
    );
    assert!(stored.is_on_target());

    assert!(harness.fetcher.requests()[0].render);
    assert!(harness.transport.texts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failures_are_isolated() -> anyhow::Result<()> {
    let harness = Harness::new();
    let tools = harness.store.add_group("Verktyg").await?;
    let food = harness.store.add_group("Mat").await?;

    let drill = harness.store.add_url(tools.id, "https://www.jula.se/catalog/borrmaskin-1", None).await?;
    let broken = harness.store.add_url(tools.id, "https://www.jula.se/catalog/utgatt-2", None).await?;
    let coffee = harness.store.add_url(food.id, "https://www.willys.se/produkt/kaffe", None).await?;

    harness.fetcher.serve(&drill.url, &jula_page("1 299:-"));
    harness
        .fetcher
        .serve(&broken.url, "<html><body><h1>Produkten finns inte längre</h1></body></html>");
    harness.fetcher.serve(&coffee.url, &willys_page("54", "90"));

    let report = harness.orchestrator().run_update().await?;
    assert_eq!(report.processed_count, 3);
    assert_eq!(report.succeeded_count, 2);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.entry_id, broken.id);
    assert_eq!(failure.group_name, "Verktyg");
    assert_eq!(failure.kind, FailureKind::NoPriceFound);

    let snapshot = harness.store.load().await?;
    assert_eq!(snapshot.entry(drill.id).unwrap().current_price, Some(1299.0));
    assert_eq!(snapshot.entry(coffee.id).unwrap().current_price, Some(54.9));
    let untouched = snapshot.entry(broken.id).unwrap();
    assert_eq!(untouched.current_price, None);
    assert!(untouched.history.is_empty());

    // Failure summary goes out exactly once.
    let texts = harness.transport.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Total: 3\nSucceeded: 2\nFailed: 1"));
    assert!(texts[0].contains(&broken.url));
    Ok(())
}

#[tokio::test]
async fn test_unchanged_price_is_a_no_op() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Verktyg").await?;
    let entry = harness.store.add_url(group.id, "https://www.jula.se/catalog/x", None).await?;
    harness.fetcher.serve(&entry.url, &jula_page("249:-"));

    let first = harness.orchestrator().run_update().await?;
    assert_eq!(first.changed_count, 1);
    let after_first = std::fs::read_to_string(harness.store.urls_path())?;

    harness.clock.advance(Duration::hours(24));
    let second = harness.orchestrator().run_update().await?;
    assert_eq!(second.processed_count, 1);
    assert_eq!(second.succeeded_count, 1);
    assert_eq!(second.changed_count, 0);

    assert_eq!(std::fs::read_to_string(harness.store.urls_path())?, after_first);
    Ok(())
}

#[tokio::test]
async fn test_history_records_every_change() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Mat").await?;
    let entry = harness.store.add_url(group.id, "https://www.willys.se/produkt/mjolk", None).await?;

    for (whole, decimals) in [("17", "90"), ("17", "90"), ("19", "50"), ("16", "90"), ("16", "90")] {
        harness.fetcher.serve(&entry.url, &willys_page(whole, decimals));
        harness.orchestrator().run_update().await?;
        harness.clock.advance(Duration::hours(6));
    }

    let snapshot = harness.store.load().await?;
    let stored = snapshot.entry(entry.id).unwrap();
    let prices: Vec<f64> = stored.history.iter().map(|point| point.price).collect();
    assert_eq!(prices, vec![17.9, 19.5, 16.9]);
    assert!(stored
        .history
        .windows(2)
        .all(|pair| pair[0].observed_at <= pair[1].observed_at));
    assert_eq!(stored.current_price, Some(16.9));
    Ok(())
}

#[tokio::test]
async fn test_clock_going_backwards_keeps_history_ordered() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Mat").await?;
    let entry = harness.store.add_url(group.id, "https://shop.example/ost", None).await?;

    harness.fetcher.serve(&entry.url, "<p>Pris: 89 kr</p>");
    harness.orchestrator().run_update().await?;

    harness.clock.advance(Duration::hours(-3));
    harness.fetcher.serve(&entry.url, "<p>Pris: 79 kr</p>");
    harness.orchestrator().run_update().await?;

    let snapshot = harness.store.load().await?;
    let history = &snapshot.entry(entry.id).unwrap().history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].observed_at, test_time());
    Ok(())
}

#[tokio::test]
async fn test_no_notification_without_failures() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Verktyg").await?;
    let entry = harness.store.add_url(group.id, "https://www.jula.se/catalog/y", None).await?;
    harness.fetcher.serve(&entry.url, &jula_page("99:-"));

    let report = harness.orchestrator().run_update().await?;
    assert!(report.failures.is_empty());
    assert!(harness.transport.texts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_all_failed_summary() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Verktyg").await?;
    let entry = harness.store.add_url(group.id, "https://www.jula.se/catalog/z", None).await?;
    harness.fetcher.fail(&entry.url, ExtractionFailure::fetch("connection refused"));

    let report = harness.orchestrator().run_update().await?;
    assert_eq!(report.failures[0].kind, FailureKind::FetchFailed);

    let texts = harness.transport.texts();
    assert!(texts[0].starts_with("❌ *Price Update Job Completed with Errors*"));
    assert!(texts[0].contains("FetchFailed: connection refused"));
    Ok(())
}

/// Fetcher that edits the store while the run is in its network phase.
struct EditingFetcher {
    store: JsonStore,
    inner: StaticFetcher,
}

#[async_trait]
impl Fetcher for EditingFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, ExtractionFailure> {
        self.store
            .add_group("Tillagd under körning")
            .await
            .map_err(|e| ExtractionFailure::fetch(e.to_string()))?;
        self.inner.fetch(request).await
    }
}

#[tokio::test]
async fn test_edits_during_run_are_preserved() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Verktyg").await?;
    let entry = harness.store.add_url(group.id, "https://www.jula.se/catalog/w", None).await?;

    let inner = StaticFetcher::new();
    inner.serve(&entry.url, &jula_page("129:-"));
    let fetcher = Arc::new(EditingFetcher {
        store: harness.store.clone(),
        inner,
    });
    let orchestrator = Orchestrator::new(
        harness.store.clone(),
        fetcher,
        harness.clock.clone(),
        Notifier::disabled(harness.transport.clone()),
        test_scraper_config(),
    );

    let report = orchestrator.run_update().await?;
    assert_eq!(report.succeeded_count, 1);

    let snapshot = harness.store.load().await?;
    assert_eq!(snapshot.groups.len(), 2);
    assert_eq!(snapshot.entry(entry.id).unwrap().current_price, Some(129.0));
    Ok(())
}

/// Fetcher that deletes the entry it is asked about.
struct DeletingFetcher {
    store: JsonStore,
    entry_id: uuid::Uuid,
}

#[async_trait]
impl Fetcher for DeletingFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> Result<String, ExtractionFailure> {
        self.store
            .delete_url(self.entry_id)
            .await
            .map_err(|e| ExtractionFailure::fetch(e.to_string()))?;
        Ok(jula_page("10:-"))
    }
}

#[tokio::test]
async fn test_entry_deleted_during_run_is_skipped() -> anyhow::Result<()> {
    let harness = Harness::new();
    let group = harness.store.add_group("Verktyg").await?;
    let entry = harness.store.add_url(group.id, "https://www.jula.se/catalog/v", None).await?;

    let orchestrator = Orchestrator::new(
        harness.store.clone(),
        Arc::new(DeletingFetcher {
            store: harness.store.clone(),
            entry_id: entry.id,
        }),
        harness.clock.clone(),
        Notifier::disabled(harness.transport.clone()),
        test_scraper_config(),
    );

    let report = orchestrator.run_update().await?;
    assert_eq!(report.processed_count, 1);
    assert_eq!(report.changed_count, 0);
    assert!(harness.store.load().await?.urls.is_empty());
    Ok(())
}
