use crate::processor::{BatchOptions, BatchSummary, Reconciler};
use crate::sheet::{
    GoogleSheetsBackend, MemoryBackend, ObjectSheetBackend, SheetBackend, SheetStore, StoredRow,
};
use crate::storage::{LocalStorage, ObjectStorage, S3Manager, S3Storage};
use chrono::{DateTime, NaiveDate, Utc};
use common::config::{SheetBackendKind, Settings};
use common::{Error, Result};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use platforms::client::PlatformClient;
use platforms::models::{Platform, PostMetrics};
use platforms::utils::url_parser::detect_platform;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Concurrent URL lookups during `update-sheet`.
const LOOKUP_CONCURRENCY: usize = 4;

/// Builds the row store selected by `sheets.backend`.
pub async fn open_store(settings: &Settings) -> Result<SheetStore> {
    let sheets = &settings.sheets;
    let backend: Arc<dyn SheetBackend> = match sheets.backend {
        SheetBackendKind::Google => Arc::new(GoogleSheetsBackend::new(sheets, &settings.http)?),
        SheetBackendKind::S3 => {
            let manager = Arc::new(S3Manager::new(sheets.s3.clone()));
            manager.verify_bucket_exists(&sheets.s3.bucket).await?;
            let storage: Arc<dyn ObjectStorage> =
                Arc::new(S3Storage::new(manager, &sheets.s3.bucket).await?);
            object_backend(storage, &sheets.s3.key).await?
        }
        SheetBackendKind::Local => {
            let path = Path::new(&sheets.local_path);
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    Error::InvalidInput(format!("Invalid sheets.local_path: {}", sheets.local_path))
                })?;
            let root = path.parent().unwrap_or_else(|| Path::new("."));
            let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(root));
            object_backend(storage, file_name).await?
        }
        SheetBackendKind::Memory => Arc::new(MemoryBackend::new()),
    };

    info!(sheet = %backend.describe(), "Opened row store");
    Ok(SheetStore::new(backend))
}

async fn object_backend(
    storage: Arc<dyn ObjectStorage>,
    key: &str,
) -> Result<Arc<dyn SheetBackend>> {
    if !storage.check_file_exists(key).await? {
        info!(location = %storage.location(), key, "No sheet document yet, starting empty");
    }
    Ok(Arc::new(ObjectSheetBackend::new(storage, key.to_string())))
}

/// Outcome of `update-sheet`: the refresh summary plus rows that could not
/// be looked up.
#[derive(Debug, Default, Serialize)]
pub struct UpdateSheetReport {
    pub summary: BatchSummary,
    pub unresolved: Vec<UnresolvedRow>,
}

#[derive(Debug, Serialize)]
pub struct UnresolvedRow {
    pub row: usize,
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub platforms: Vec<(Platform, bool)>,
    pub backend: SheetBackendKind,
    pub sheet_configured: bool,
    pub days_lookback: i64,
    pub report_utc_offset_hours: i32,
}

/// The configured platform clients. Enough for `fetch` and `lookup`, which
/// never open the row store.
pub struct PostSource {
    clients: Vec<Arc<dyn PlatformClient>>,
}

impl PostSource {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self::from_clients(platforms::build_clients(settings)?))
    }

    pub fn from_clients(clients: Vec<Arc<dyn PlatformClient>>) -> Self {
        Self { clients }
    }

    fn client_for(&self, platform: Platform) -> Option<&Arc<dyn PlatformClient>> {
        self.clients.iter().find(|c| c.platform() == platform)
    }

    /// Posts from every configured platform (or just `only`), newest first.
    /// A platform that fails is logged and left out.
    pub async fn fetch_all(
        &self,
        since: DateTime<Utc>,
        only: Option<Platform>,
    ) -> Result<Vec<PostMetrics>> {
        let selected: Vec<_> = self
            .clients
            .iter()
            .filter(|c| only.is_none_or(|p| p == c.platform()))
            .collect();
        if selected.is_empty() {
            return Err(Error::InvalidInput(match only {
                Some(p) => format!("{} is not configured", p.display_name()),
                None => "No platforms are configured".to_string(),
            }));
        }

        let results = join_all(selected.iter().map(|client| async move {
            (client.platform(), client.get_posts_with_metrics(since).await)
        }))
        .await;

        let mut posts = Vec::new();
        for (platform, result) in results {
            match result {
                Ok(fetched) => {
                    info!(%platform, count = fetched.len(), "Fetched posts");
                    posts.extend(fetched);
                }
                Err(e) => warn!(%platform, error = %e, "Skipping platform after fetch failure"),
            }
        }

        posts.sort_by(|a, b| b.created_time.cmp(&a.created_time));
        Ok(posts)
    }

    /// Metrics for a single post URL.
    pub async fn lookup(&self, url: &str) -> Result<Option<PostMetrics>> {
        let detected = detect_platform(url)
            .ok_or_else(|| Error::InvalidInput(format!("Unrecognized post URL: {}", url)))?;
        let platform = detected
            .supported()
            .ok_or_else(|| Error::InvalidInput(format!("{} is not supported", detected)))?;
        let client = self.client_for(platform).ok_or_else(|| {
            Error::InvalidInput(format!("{} is not configured", platform.display_name()))
        })?;

        client.get_metrics_for_url(url).await
    }

    async fn lookup_row(&self, row: &StoredRow) -> std::result::Result<PostMetrics, String> {
        let platform = row
            .platform()
            .ok_or_else(|| "unsupported platform".to_string())?;
        let client = self
            .client_for(platform)
            .ok_or_else(|| format!("{} is not configured", platform.display_name()))?;

        match client.get_metrics_for_url(&row.post_url).await {
            Ok(Some(fresh)) => Ok(fresh),
            Ok(None) => Err("post not found".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Wires platform clients to the reconciliation engine.
pub struct ReportService {
    source: PostSource,
    reconciler: Reconciler,
}

impl ReportService {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let source = PostSource::new(settings)?;
        let store = open_store(settings).await?;
        Ok(Self {
            source,
            reconciler: Reconciler::new(store),
        })
    }

    pub fn with_parts(clients: Vec<Arc<dyn PlatformClient>>, store: SheetStore) -> Self {
        Self {
            source: PostSource::from_clients(clients),
            reconciler: Reconciler::new(store),
        }
    }

    pub fn source(&self) -> &PostSource {
        &self.source
    }

    pub fn store(&self) -> &SheetStore {
        self.reconciler.store()
    }

    /// Fetches, makes sure the header row exists and reconciles.
    pub async fn run(&self, since: DateTime<Utc>, options: BatchOptions) -> Result<BatchSummary> {
        let posts = self.source.fetch_all(since, None).await?;
        if !options.dry_run {
            self.store().ensure_headers().await?;
        }
        self.reconciler.reconcile_batch_with(&posts, options).await
    }

    /// Re-fetches metrics for rows already in the store, optionally only
    /// those at least `min_age_days` old.
    pub async fn update_sheet(
        &self,
        min_age_days: Option<i64>,
        today: NaiveDate,
        options: BatchOptions,
    ) -> Result<UpdateSheetReport> {
        let rows = match min_age_days {
            Some(days) => self.store().rows_older_than(days, today).await?,
            None => self.store().read_all().await?,
        };
        info!(rows = rows.len(), "Refreshing stored rows");

        let lookups = stream::iter(rows)
            .map(|row| async move {
                let result = self.source.lookup_row(&row).await;
                (row, result)
            })
            .buffered(LOOKUP_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let mut pairs = Vec::new();
        let mut unresolved = Vec::new();
        for (row, result) in lookups {
            match result {
                Ok(fresh) => pairs.push((row, fresh)),
                Err(reason) => {
                    warn!(row = row.row_number, url = %row.post_url, %reason, "Could not refresh row");
                    unresolved.push(UnresolvedRow {
                        row: row.row_number,
                        url: row.post_url,
                        reason,
                    });
                }
            }
        }

        let summary = self.reconciler.refresh_rows(&pairs, options).await?;
        Ok(UpdateSheetReport {
            summary,
            unresolved,
        })
    }
}

/// Configuration overview; needs no network access.
pub fn status(settings: &Settings) -> StatusReport {
    StatusReport {
        platforms: vec![
            (Platform::Facebook, settings.facebook_enabled()),
            (Platform::Instagram, settings.instagram_enabled()),
            (Platform::Twitter, settings.twitter_enabled()),
        ],
        backend: settings.sheets.backend,
        sheet_configured: settings.sheets_configured(),
        days_lookback: settings.days_lookback,
        report_utc_offset_hours: settings.report_utc_offset_hours,
    }
}
