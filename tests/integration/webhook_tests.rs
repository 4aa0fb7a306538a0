use super::*;
use prisbevakaren::notifier::ReqwestTransport;
use prisbevakaren::HttpFetcher;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_http_pipeline_posts_failure_summary() -> anyhow::Result<()> {
    let shop = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/produkt/stol"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><script type="application/ld+json">
               {"@type":"Product","name":"Stol","offers":{"@type":"Offer","price":"349.00","priceCurrency":"SEK"}}
               </script></head><body></body></html>"#,
        ))
        .mount(&shop)
        .await;
    Mock::given(method("GET"))
        .and(path("/produkt/borta"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&shop)
        .await;

    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(serde_json::json!({"username": "prisbevakaren"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&hook)
        .await;

    let harness = Harness::new();
    let group = harness.store.add_group("Möbler").await?;
    let chair = harness
        .store
        .add_url(group.id, &format!("{}/produkt/stol", shop.uri()), Some(400.0))
        .await?;
    harness
        .store
        .add_url(group.id, &format!("{}/produkt/borta", shop.uri()), None)
        .await?;

    let config = test_scraper_config();
    let notifier = Notifier::new(
        Some(format!("{}/hook", hook.uri())),
        Some("prisbevakaren".to_string()),
        Arc::new(ReqwestTransport::new()?),
    );
    let orchestrator = Orchestrator::new(
        harness.store.clone(),
        Arc::new(HttpFetcher::new(&config)?),
        harness.clock.clone(),
        notifier,
        config,
    );

    let report = orchestrator.run_update().await?;
    assert_eq!(report.succeeded_count, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].detail.contains("404"));
    assert_eq!(report.on_target, vec![chair.id]);

    let snapshot = harness.store.load().await?;
    assert_eq!(snapshot.entry(chair.id).unwrap().current_price, Some(349.0));
    Ok(())
}

#[tokio::test]
async fn test_webhook_outage_does_not_fail_the_run() -> anyhow::Result<()> {
    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&hook)
        .await;

    let harness = Harness::new();
    let group = harness.store.add_group("Verktyg").await?;
    let entry = harness.store.add_url(group.id, "https://www.jula.se/catalog/q", None).await?;
    harness.fetcher.fail(&entry.url, ExtractionFailure::fetch("timed out"));

    let notifier = Notifier::new(Some(hook.uri()), None, Arc::new(ReqwestTransport::new()?));
    let orchestrator = Orchestrator::new(
        harness.store.clone(),
        harness.fetcher.clone(),
        harness.clock.clone(),
        notifier,
        test_scraper_config(),
    );

    let report = orchestrator.run_update().await?;
    assert_eq!(report.failures.len(), 1);
    Ok(())
}
