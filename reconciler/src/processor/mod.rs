//! Matching fetched posts against stored rows.
//!
//! Every record either updates the row with the same normalized URL or is
//! appended as a new row. Batches run under a single writer lock so the
//! find-then-write sequence of one caller never interleaves with another's.

use crate::sheet::{SheetStore, StoredRow};
use common::Result;
use platforms::models::{EngagementMetrics, Platform, PostMetrics};
use platforms::utils::url_parser::normalize_url;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Updated,
    Added,
}

/// What happened, or would happen, to one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecordOutcome {
    WouldUpdate {
        url: String,
        row: usize,
        before: EngagementMetrics,
        after: EngagementMetrics,
    },
    WouldAdd {
        url: String,
        platform: Platform,
        metrics: EngagementMetrics,
    },
    Updated {
        url: String,
        row: usize,
    },
    Added {
        url: String,
        row: usize,
    },
    Failed {
        url: String,
        error: String,
    },
}

impl RecordOutcome {
    pub fn url(&self) -> &str {
        match self {
            RecordOutcome::WouldUpdate { url, .. }
            | RecordOutcome::WouldAdd { url, .. }
            | RecordOutcome::Updated { url, .. }
            | RecordOutcome::Added { url, .. }
            | RecordOutcome::Failed { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub dry_run: bool,
    pub updated: usize,
    pub added: usize,
    /// Reserved; nothing is skipped today.
    pub skipped: usize,
    pub failed: usize,
    pub details: Vec<RecordOutcome>,
}

impl BatchSummary {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: RecordOutcome) {
        match &outcome {
            RecordOutcome::WouldUpdate { .. } | RecordOutcome::Updated { .. } => self.updated += 1,
            RecordOutcome::WouldAdd { .. } | RecordOutcome::Added { .. } => self.added += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
        self.details.push(outcome);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub dry_run: bool,
    /// Record per-record store failures and keep going instead of aborting.
    pub continue_on_error: bool,
}

impl BatchOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }
}

/// A stored row as the dry run sees it after earlier simulated writes.
struct SimulatedRow {
    row: usize,
    metrics: EngagementMetrics,
}

pub struct Reconciler {
    store: SheetStore,
    writer: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: SheetStore) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SheetStore {
        &self.store
    }

    /// Updates the matching row or appends a new one. Returns the row touched.
    pub async fn reconcile_one(&self, record: &PostMetrics) -> Result<(Action, usize)> {
        let _guard = self.writer.lock().await;
        self.apply(record).await
    }

    async fn apply(&self, record: &PostMetrics) -> Result<(Action, usize)> {
        match self.store.find_by_identity(&record.post_url).await? {
            Some(existing) => {
                self.store.update(existing.row_number, record).await?;
                Ok((Action::Updated, existing.row_number))
            }
            None => {
                let row = self.store.append(record).await?;
                Ok((Action::Added, row))
            }
        }
    }

    pub async fn reconcile_batch(
        &self,
        records: &[PostMetrics],
        dry_run: bool,
    ) -> Result<BatchSummary> {
        self.reconcile_batch_with(
            records,
            BatchOptions {
                dry_run,
                ..BatchOptions::default()
            },
        )
        .await
    }

    /// Applies `records` in order. A store error aborts the batch unless
    /// `continue_on_error` is set.
    pub async fn reconcile_batch_with(
        &self,
        records: &[PostMetrics],
        options: BatchOptions,
    ) -> Result<BatchSummary> {
        let _guard = self.writer.lock().await;

        let summary = if options.dry_run {
            self.simulate(records).await?
        } else {
            let mut summary = BatchSummary::new(false);
            for record in records {
                let outcome = match self.apply(record).await {
                    Ok((Action::Updated, row)) => RecordOutcome::Updated {
                        url: record.post_url.clone(),
                        row,
                    },
                    Ok((Action::Added, row)) => RecordOutcome::Added {
                        url: record.post_url.clone(),
                        row,
                    },
                    Err(e) if options.continue_on_error => {
                        warn!(url = %record.post_url, error = %e, "Failed to reconcile record");
                        RecordOutcome::Failed {
                            url: record.post_url.clone(),
                            error: e.to_string(),
                        }
                    }
                    Err(e) => return Err(e),
                };
                summary.record(outcome);
            }
            summary
        };

        info!(
            dry_run = options.dry_run,
            updated = summary.updated,
            added = summary.added,
            failed = summary.failed,
            "Reconciled batch"
        );
        Ok(summary)
    }

    /// Dry run over one snapshot. Simulated appends are visible to later
    /// records, so the counts match what a real run would report.
    async fn simulate(&self, records: &[PostMetrics]) -> Result<BatchSummary> {
        let snapshot = self.store.snapshot().await?;
        let mut next_row = snapshot.next_row;
        let mut index: HashMap<String, SimulatedRow> = HashMap::new();
        for row in snapshot.rows {
            index.entry(row.identity()).or_insert(SimulatedRow {
                row: row.row_number,
                metrics: row.metrics,
            });
        }

        let mut summary = BatchSummary::new(true);
        for record in records {
            let key = normalize_url(&record.post_url);
            let outcome = match index.get_mut(&key) {
                Some(existing) => {
                    let before = existing.metrics;
                    existing.metrics = record.metrics;
                    RecordOutcome::WouldUpdate {
                        url: record.post_url.clone(),
                        row: existing.row,
                        before,
                        after: record.metrics,
                    }
                }
                None => {
                    index.insert(
                        key,
                        SimulatedRow {
                            row: next_row,
                            metrics: record.metrics,
                        },
                    );
                    next_row += 1;
                    RecordOutcome::WouldAdd {
                        url: record.post_url.clone(),
                        platform: record.platform,
                        metrics: record.metrics,
                    }
                }
            };
            debug!(url = %record.post_url, ?outcome, "Simulated");
            summary.record(outcome);
        }

        Ok(summary)
    }

    /// Writes fresh metrics onto already-stored rows by row number. Used when
    /// the fetched permalink may differ from the stored URL.
    pub async fn refresh_rows(
        &self,
        pairs: &[(StoredRow, PostMetrics)],
        options: BatchOptions,
    ) -> Result<BatchSummary> {
        let _guard = self.writer.lock().await;
        let mut summary = BatchSummary::new(options.dry_run);

        for (row, fresh) in pairs {
            let outcome = if options.dry_run {
                RecordOutcome::WouldUpdate {
                    url: row.post_url.clone(),
                    row: row.row_number,
                    before: row.metrics,
                    after: fresh.metrics,
                }
            } else {
                match self.store.update(row.row_number, fresh).await {
                    Ok(()) => RecordOutcome::Updated {
                        url: row.post_url.clone(),
                        row: row.row_number,
                    },
                    Err(e) if options.continue_on_error => {
                        warn!(row = row.row_number, error = %e, "Failed to refresh row");
                        RecordOutcome::Failed {
                            url: row.post_url.clone(),
                            error: e.to_string(),
                        }
                    }
                    Err(e) => return Err(e),
                }
            };
            summary.record(outcome);
        }

        info!(
            dry_run = options.dry_run,
            updated = summary.updated,
            failed = summary.failed,
            "Refreshed rows"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{CellValue, MemoryBackend, SheetBackend, HEADERS};
    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeZone};
    use common::Error;
    use std::sync::Arc;

    fn record(url: &str, views: u64) -> PostMetrics {
        PostMetrics {
            post_id: url.rsplit('/').next().unwrap_or_default().to_string(),
            post_url: url.to_string(),
            platform: Platform::Facebook,
            created_time: FixedOffset::east_opt(7 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 1, 17, 15, 0)
                .unwrap(),
            caption: "caption".into(),
            metrics: EngagementMetrics {
                views,
                ..EngagementMetrics::default()
            },
        }
    }

    async fn engine() -> (Arc<MemoryBackend>, Reconciler) {
        let backend = Arc::new(MemoryBackend::new());
        let store = SheetStore::new(backend.clone());
        store.ensure_headers().await.unwrap();
        (backend, Reconciler::new(store))
    }

    #[tokio::test]
    async fn test_reconcile_one_is_idempotent() {
        let (backend, engine) = engine().await;
        let post = record("https://facebook.com/p/1/posts/2", 5);

        assert_eq!(engine.reconcile_one(&post).await.unwrap(), (Action::Added, 2));
        assert_eq!(engine.reconcile_one(&post).await.unwrap(), (Action::Updated, 2));
        assert_eq!(engine.reconcile_one(&post).await.unwrap(), (Action::Updated, 2));
        assert_eq!(backend.row_count().await, 2);
    }

    #[tokio::test]
    async fn test_cosmetic_url_variant_updates_same_row() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![
            HEADERS.iter().map(|h| h.to_string()).collect(),
            [
                "2024-03-01",
                "17:15",
                "Facebook",
                "https://www.facebook.com/p/100/posts/555",
                "Grand opening",
                "10",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        ]));
        let engine = Reconciler::new(SheetStore::new(backend.clone()));

        let summary = engine
            .reconcile_batch(&[record("https://facebook.com/p/100/posts/555/", 25)], false)
            .await
            .unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.added, 0);
        assert_eq!(
            summary.details,
            vec![RecordOutcome::Updated {
                url: "https://facebook.com/p/100/posts/555/".into(),
                row: 2
            }]
        );
        let rows = engine.store().read_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metrics.views, 25);
        assert_eq!(rows[0].caption, "Grand opening");
    }

    #[tokio::test]
    async fn test_add_then_update_across_batches() {
        let (_, engine) = engine().await;
        let a = record("https://twitter.com/i/web/status/1", 1);
        let b = record("https://twitter.com/i/web/status/2", 2);

        let first = engine.reconcile_batch(&[a.clone()], false).await.unwrap();
        assert_eq!((first.added, first.updated), (1, 0));

        let second = engine
            .reconcile_batch(&[record("https://x.com/i/web/status/1", 9), b], false)
            .await
            .unwrap();
        assert_eq!((second.added, second.updated, second.skipped), (1, 1, 0));
        assert_eq!(engine.store().read_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_store_untouched() {
        let (backend, engine) = engine().await;
        engine
            .reconcile_one(&record("https://facebook.com/p/1", 10))
            .await
            .unwrap();
        let before = backend.read_values().await.unwrap();

        let batch = [
            record("https://www.facebook.com/p/1/", 40),
            record("https://facebook.com/p/2", 7),
        ];
        let summary = engine.reconcile_batch(&batch, true).await.unwrap();

        assert!(summary.dry_run);
        assert_eq!((summary.updated, summary.added), (1, 1));
        assert_eq!(
            summary.details[0],
            RecordOutcome::WouldUpdate {
                url: "https://www.facebook.com/p/1/".into(),
                row: 2,
                before: EngagementMetrics {
                    views: 10,
                    ..EngagementMetrics::default()
                },
                after: EngagementMetrics {
                    views: 40,
                    ..EngagementMetrics::default()
                },
            }
        );
        assert!(matches!(
            summary.details[1],
            RecordOutcome::WouldAdd {
                platform: Platform::Facebook,
                ..
            }
        ));
        assert_eq!(backend.read_values().await.unwrap(), before);

        // the real run reports the same counts
        let real = engine.reconcile_batch(&batch, false).await.unwrap();
        assert_eq!((real.updated, real.added), (summary.updated, summary.added));
    }

    #[tokio::test]
    async fn test_duplicate_urls_in_one_batch() {
        let batch = [
            record("https://instagram.com/p/abc", 1),
            record("https://www.instagram.com/p/abc/", 2),
        ];

        let (backend, engine) = engine().await;
        let simulated = engine.reconcile_batch(&batch, true).await.unwrap();
        assert_eq!((simulated.added, simulated.updated), (1, 1));
        assert_eq!(
            simulated.details[1],
            RecordOutcome::WouldUpdate {
                url: "https://www.instagram.com/p/abc/".into(),
                row: 2,
                before: EngagementMetrics {
                    views: 1,
                    ..EngagementMetrics::default()
                },
                after: EngagementMetrics {
                    views: 2,
                    ..EngagementMetrics::default()
                },
            }
        );

        let real = engine.reconcile_batch(&batch, false).await.unwrap();
        assert_eq!((real.added, real.updated), (1, 1));
        assert_eq!(backend.row_count().await, 2);
        // second write wins
        assert_eq!(engine.store().read_all().await.unwrap()[0].metrics.views, 2);
    }

    /// Fails every write to one row number.
    struct FlakyBackend {
        inner: MemoryBackend,
        bad_row: usize,
    }

    #[async_trait]
    impl SheetBackend for FlakyBackend {
        async fn read_values(&self) -> common::Result<Vec<Vec<String>>> {
            self.inner.read_values().await
        }

        async fn write_range(
            &self,
            row: usize,
            start_col: usize,
            values: Vec<CellValue>,
        ) -> common::Result<()> {
            if row == self.bad_row {
                return Err(Error::from_status(503, "backend unavailable"));
            }
            self.inner.write_range(row, start_col, values).await
        }

        async fn append_row(&self, values: Vec<CellValue>) -> common::Result<usize> {
            self.inner.append_row(values).await
        }

        fn describe(&self) -> String {
            "flaky".into()
        }
    }

    async fn flaky_engine() -> Reconciler {
        let backend = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(),
            bad_row: 2,
        });
        let store = SheetStore::new(backend);
        store.ensure_headers().await.unwrap();
        store.append(&record("https://facebook.com/p/1", 1)).await.unwrap();
        Reconciler::new(store)
    }

    #[tokio::test]
    async fn test_store_error_aborts_batch_by_default() {
        let engine = flaky_engine().await;
        let batch = [
            record("https://facebook.com/p/1", 5),
            record("https://facebook.com/p/2", 5),
        ];

        assert!(engine.reconcile_batch(&batch, false).await.is_err());
        // nothing after the failing record was applied
        assert_eq!(engine.store().read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_continue_on_error_records_failures() {
        let engine = flaky_engine().await;
        let batch = [
            record("https://facebook.com/p/1", 5),
            record("https://facebook.com/p/2", 5),
        ];

        let summary = engine
            .reconcile_batch_with(
                &batch,
                BatchOptions {
                    dry_run: false,
                    continue_on_error: true,
                },
            )
            .await
            .unwrap();

        assert_eq!((summary.failed, summary.added, summary.updated), (1, 1, 0));
        assert!(matches!(&summary.details[0], RecordOutcome::Failed { url, .. } if url == "https://facebook.com/p/1"));
        assert_eq!(summary.details[1].url(), "https://facebook.com/p/2");
    }

    #[tokio::test]
    async fn test_concurrent_callers_never_double_append() {
        let (backend, engine) = engine().await;
        let engine = Arc::new(engine);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    let url = if i % 2 == 0 {
                        "https://www.x.com/a/status/7/"
                    } else {
                        "https://twitter.com/a/status/7"
                    };
                    engine.reconcile_one(&record(url, i)).await.unwrap()
                })
            })
            .collect();

        let mut added = 0;
        for task in tasks {
            if task.await.unwrap().0 == Action::Added {
                added += 1;
            }
        }

        assert_eq!(added, 1);
        assert_eq!(backend.row_count().await, 2);
    }

    #[tokio::test]
    async fn test_refresh_rows_by_row_number() {
        let (backend, engine) = engine().await;
        engine
            .reconcile_one(&record("https://facebook.com/p/1", 3))
            .await
            .unwrap();
        let stored = engine.store().read_all().await.unwrap().remove(0);
        // the API returns a different canonical permalink
        let fresh = record("https://www.facebook.com/permalink.php?story_fbid=1", 30);
        let pairs = vec![(stored, fresh)];

        let preview = engine
            .refresh_rows(&pairs, BatchOptions::dry_run())
            .await
            .unwrap();
        assert!(matches!(
            preview.details[0],
            RecordOutcome::WouldUpdate { row: 2, .. }
        ));
        assert_eq!(engine.store().read_all().await.unwrap()[0].metrics.views, 3);

        let applied = engine
            .refresh_rows(&pairs, BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(applied.updated, 1);
        assert_eq!(backend.row_count().await, 2);
        assert_eq!(engine.store().read_all().await.unwrap()[0].metrics.views, 30);
    }

    #[test]
    fn test_summary_serializes_with_action_tags() {
        let mut summary = BatchSummary::new(false);
        summary.record(RecordOutcome::Added {
            url: "https://twitter.com/i/web/status/1".into(),
            row: 4,
        });

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["added"], 1);
        assert_eq!(json["details"][0]["action"], "added");
        assert_eq!(json["details"][0]["row"], 4);
    }
}
