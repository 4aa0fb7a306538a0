//! One batch price update over every tracked URL.
//!
//! The network phase works from an unlocked snapshot. Results are applied
//! afterwards to a fresh load under the store lock, so edits made while
//! pages were being fetched survive the run.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::ScraperConfig;
use crate::extraction::{dispatcher, ExtractionFailure, ExtractionResult, Strategy};
use crate::fetcher::{FetchRequest, Fetcher};
use crate::models::ChangeType;
use crate::notifier::Notifier;
use crate::store::{JsonStore, StoreSnapshot};
use crate::utils::{Clock, Result};

pub mod report;

pub use report::{UpdateFailure, UpdateReport};

/// Extra time given to a fetch on top of its full retry budget before the
/// orchestrator gives up on it.
const TIMEOUT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct WorkItem {
    group_id: Uuid,
    group_name: String,
    entry_id: Uuid,
    url: String,
    strategy: Strategy,
    render: bool,
}

impl WorkItem {
    fn failure(&self, failure: ExtractionFailure) -> UpdateFailure {
        UpdateFailure::new(self.group_id, &self.group_name, self.entry_id, &self.url, failure)
    }
}

fn work_list(snapshot: &StoreSnapshot) -> Vec<WorkItem> {
    snapshot
        .ordered_entries()
        .into_iter()
        .map(|(group, entry)| WorkItem {
            group_id: group.id,
            group_name: group.name.clone(),
            entry_id: entry.id,
            url: entry.url.clone(),
            strategy: dispatcher::resolve(&entry.url),
            render: dispatcher::requires_rendering(&entry.url),
        })
        .collect()
}

pub struct Orchestrator {
    store: JsonStore,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    config: ScraperConfig,
}

impl Orchestrator {
    pub fn new(
        store: JsonStore,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        notifier: Notifier,
        config: ScraperConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            clock,
            notifier,
            config,
        }
    }

    /// Checks every entry, persists the results once and notifies about
    /// failures. Only store errors (`CorruptStore`, `StoreBusy`, I/O) are
    /// returned; per-URL problems end up in the report.
    pub async fn run_update(&self) -> Result<UpdateReport> {
        let started_at = self.clock.now();
        let timer = Instant::now();

        let snapshot = self.store.load().await?;
        let work = work_list(&snapshot);
        tracing::info!("Found {} URLs to process", work.len());

        let concurrency = self.config.max_concurrent_checks.max(1);
        let outcomes: Vec<(WorkItem, ExtractionResult)> = stream::iter(work)
            .map(|item| async move {
                let outcome = self.check(&item).await;
                (item, outcome)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = self
            .store
            .update(|snapshot| Ok(self.apply(snapshot, outcomes, started_at)))
            .await?;
        report.finished_at = self.clock.now();

        self.record_metrics(&report, timer.elapsed());
        tracing::info!(
            "Price update completed: total {}, succeeded {}, failed {}, changed {}",
            report.processed_count,
            report.succeeded_count,
            report.failed_count(),
            report.changed_count
        );

        if report.has_failures() {
            self.notifier.notify(&report).await;
        }
        Ok(report)
    }

    async fn check(&self, item: &WorkItem) -> ExtractionResult {
        tracing::debug!("Processing {} with {} strategy", item.url, item.strategy);
        let timeout = self.config.request_timeout();
        let request = FetchRequest::new(item.url.as_str(), timeout).rendered(item.render);

        let budget = self.config.fetch_budget(item.render) + TIMEOUT_GRACE;

        let page = match tokio::time::timeout(budget, self.fetcher.fetch(&request)).await {
            Ok(Ok(page)) => page,
            Ok(Err(failure)) => return Err(failure),
            Err(_) => {
                return Err(ExtractionFailure::fetch(format!(
                    "no response from {} within {:.1}s",
                    item.url,
                    budget.as_secs_f64()
                )))
            }
        };

        item.strategy.extract_with_confidence(&page, self.config.min_confidence)
    }

    fn apply(
        &self,
        snapshot: &mut StoreSnapshot,
        outcomes: Vec<(WorkItem, ExtractionResult)>,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> UpdateReport {
        let mut report = UpdateReport::empty(started_at);

        for (item, outcome) in outcomes {
            report.processed_count += 1;

            let price = match outcome {
                Ok(price) => price,
                Err(failure) => {
                    tracing::warn!("Failed to update {}: {}", item.url, failure);
                    report.failures.push(item.failure(failure));
                    continue;
                }
            };
            report.succeeded_count += 1;
            tracing::info!("Found price {} for {}", price, item.url);

            let Some(entry) = snapshot.entry_mut(item.entry_id).filter(|entry| entry.url == item.url) else {
                tracing::info!("{} was removed or edited during the run, discarding its price", item.url);
                continue;
            };

            let previous = entry.current_price;
            match entry.record_price(price, self.clock.now()) {
                ChangeType::Unchanged => tracing::info!("Price unchanged for {}: {}", item.url, price),
                ChangeType::Initial => {
                    report.changed_count += 1;
                    tracing::info!("First price for {}: {}", item.url, price);
                }
                ChangeType::Increased | ChangeType::Decreased => {
                    report.changed_count += 1;
                    tracing::info!(
                        "Price changed for {}: {} -> {}",
                        item.url,
                        previous.unwrap_or_default(),
                        price
                    );
                }
            }
        }

        report.on_target = snapshot
            .urls
            .iter()
            .filter(|entry| entry.is_on_target())
            .map(|entry| entry.id)
            .collect();
        report
    }

    fn record_metrics(&self, report: &UpdateReport, elapsed: Duration) {
        metrics::counter!("prisbevakaren_urls_processed_total").increment(report.processed_count as u64);
        metrics::counter!("prisbevakaren_urls_succeeded_total").increment(report.succeeded_count as u64);
        metrics::counter!("prisbevakaren_urls_failed_total").increment(report.failed_count() as u64);
        metrics::counter!("prisbevakaren_price_changes_total").increment(report.changed_count as u64);
        metrics::histogram!("prisbevakaren_update_duration_seconds").record(elapsed.as_secs_f64());
    }
}
