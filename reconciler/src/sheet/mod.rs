//! Row store over a spreadsheet-shaped grid.
//!
//! Row 1 holds [`HEADERS`]; every later row is one post. Rows are located by
//! the normalized post URL in column D and only ever updated in the metrics
//! block (F..M) or appended, never deleted.

pub mod google;
pub mod memory;
pub mod object;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{Error, Result};
use platforms::models::{truncate_caption, EngagementMetrics, Platform, PostMetrics};
use platforms::utils::url_parser::{detect_platform, normalize_url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub use google::GoogleSheetsBackend;
pub use memory::MemoryBackend;
pub use object::ObjectSheetBackend;

pub const HEADERS: [&str; 13] = [
    "Date",
    "Time",
    "Platform",
    "Post URL",
    "Caption",
    "Views",
    "Interactions",
    "Reach",
    "Follows",
    "Link Clicks",
    "Likes",
    "Comments",
    "Shares",
];

pub const COL_DATE: usize = 0;
pub const COL_TIME: usize = 1;
pub const COL_PLATFORM: usize = 2;
pub const COL_URL: usize = 3;
pub const COL_CAPTION: usize = 4;
/// First of the eight contiguous metric columns.
pub const COL_METRICS: usize = 5;

pub const CAPTION_MAX_CHARS: usize = 200;

/// A cell as written. Numbers stay numbers so the sheet can sum them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(u64),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Text(String::new())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Raw grid access. Rows are 1-based, columns 0-based.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    /// Every row as displayed text, header included. Rows may be ragged.
    async fn read_values(&self) -> Result<Vec<Vec<String>>>;

    /// Overwrites `values.len()` consecutive cells of `row` from `start_col`
    /// in one write.
    async fn write_range(&self, row: usize, start_col: usize, values: Vec<CellValue>) -> Result<()>;

    /// Adds a row after the last one and returns its row number.
    async fn append_row(&self, values: Vec<CellValue>) -> Result<usize>;

    fn describe(&self) -> String;
}

/// A persisted data row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow {
    pub row_number: usize,
    pub date: String,
    pub time: String,
    pub platform: String,
    pub post_url: String,
    pub caption: String,
    #[serde(flatten)]
    pub metrics: EngagementMetrics,
}

impl StoredRow {
    /// `None` for rows without a URL; those are not posts.
    pub fn from_cells(row_number: usize, cells: &[String]) -> Option<Self> {
        let cell = |idx: usize| cells.get(idx).map(|c| c.trim()).unwrap_or_default();

        let post_url = cell(COL_URL);
        if post_url.is_empty() {
            return None;
        }

        let mut metrics = [0u64; EngagementMetrics::FIELD_COUNT];
        for (offset, value) in metrics.iter_mut().enumerate() {
            *value = parse_count(cell(COL_METRICS + offset));
        }

        Some(Self {
            row_number,
            date: cell(COL_DATE).to_string(),
            time: cell(COL_TIME).to_string(),
            platform: cell(COL_PLATFORM).to_string(),
            post_url: post_url.to_string(),
            caption: cell(COL_CAPTION).to_string(),
            metrics: EngagementMetrics::from_array(metrics),
        })
    }

    pub fn identity(&self) -> String {
        normalize_url(&self.post_url)
    }

    /// Platform from the `Platform` cell, falling back to the URL's host.
    pub fn platform(&self) -> Option<Platform> {
        self.platform
            .parse::<Platform>()
            .ok()
            .or_else(|| detect_platform(&self.post_url).and_then(|p| p.supported()))
    }

    pub fn published_on(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

/// Reads a metric cell the way people type them: `1,234`, ` 12 `, `12.0`.
/// Anything else, negatives included, counts as zero.
pub fn parse_count(cell: &str) -> u64 {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return 0;
    }
    if let Ok(value) = cleaned.parse::<u64>() {
        return value;
    }
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value as u64,
        _ => 0,
    }
}

/// The 13 cells of a new row for `record`.
pub fn record_to_row(record: &PostMetrics) -> Vec<CellValue> {
    let mut row = vec![
        CellValue::text(record.date_string()),
        CellValue::text(record.time_string()),
        CellValue::text(record.platform.display_name()),
        CellValue::text(record.post_url.clone()),
        CellValue::text(truncate_caption(&record.caption, CAPTION_MAX_CHARS)),
    ];
    row.extend(metrics_to_cells(&record.metrics));
    row
}

pub fn metrics_to_cells(metrics: &EngagementMetrics) -> Vec<CellValue> {
    metrics.to_array().into_iter().map(CellValue::Number).collect()
}

/// Data rows plus the row number the next append will get.
#[derive(Debug, Clone, Default)]
pub struct SheetSnapshot {
    pub rows: Vec<StoredRow>,
    pub next_row: usize,
}

/// Typed row store over a [`SheetBackend`]. Never retries; backend errors
/// surface unchanged.
#[derive(Clone)]
pub struct SheetStore {
    backend: Arc<dyn SheetBackend>,
}

impl SheetStore {
    pub fn new(backend: Arc<dyn SheetBackend>) -> Self {
        Self { backend }
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Writes the header row unless row 1 already matches. Returns whether it wrote.
    pub async fn ensure_headers(&self) -> Result<bool> {
        let values = self.backend.read_values().await?;
        let current: Vec<&str> = values
            .first()
            .map(|row| row.iter().map(|c| c.trim()).collect())
            .unwrap_or_default();

        if current == HEADERS {
            return Ok(false);
        }

        info!(sheet = %self.describe(), "Writing header row");
        let header = HEADERS.iter().map(|h| CellValue::text(*h)).collect();
        self.backend.write_range(1, 0, header).await?;
        Ok(true)
    }

    pub async fn snapshot(&self) -> Result<SheetSnapshot> {
        let values = self.backend.read_values().await?;
        let next_row = values.len().max(1) + 1;
        let rows = values
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(idx, cells)| StoredRow::from_cells(idx + 1, cells))
            .collect();

        Ok(SheetSnapshot { rows, next_row })
    }

    pub async fn read_all(&self) -> Result<Vec<StoredRow>> {
        Ok(self.snapshot().await?.rows)
    }

    /// First row whose URL normalizes to the same key as `url`.
    pub async fn find_by_identity(&self, url: &str) -> Result<Option<StoredRow>> {
        let key = normalize_url(url);
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|row| row.identity() == key))
    }

    /// Overwrites the eight metric cells of `row_number` with `record`'s metrics.
    pub async fn update(&self, row_number: usize, record: &PostMetrics) -> Result<()> {
        if row_number < 2 {
            return Err(Error::InvalidInput(format!(
                "Row {} is not a data row",
                row_number
            )));
        }

        debug!(row = row_number, url = %record.post_url, "Updating metrics");
        self.backend
            .write_range(row_number, COL_METRICS, metrics_to_cells(&record.metrics))
            .await
    }

    pub async fn append(&self, record: &PostMetrics) -> Result<usize> {
        let row_number = self.backend.append_row(record_to_row(record)).await?;
        debug!(row = row_number, url = %record.post_url, "Appended row");
        Ok(row_number)
    }

    /// Rows published at least `days` days before `today`. Rows without a
    /// readable date are left out.
    pub async fn rows_older_than(&self, days: i64, today: NaiveDate) -> Result<Vec<StoredRow>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|row| {
                row.published_on()
                    .is_some_and(|date| (today - date).num_days() >= days)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn record(url: &str, views: u64) -> PostMetrics {
        PostMetrics {
            post_id: "1".into(),
            post_url: url.into(),
            platform: Platform::Facebook,
            created_time: FixedOffset::east_opt(7 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 1, 17, 15, 0)
                .unwrap(),
            caption: "line one\nline two".into(),
            metrics: EngagementMetrics {
                views,
                likes: 3,
                ..EngagementMetrics::default()
            },
        }
    }

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1,234"), 1234);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("  42 "), 42);
        assert_eq!(parse_count("12.0"), 12);
        assert_eq!(parse_count("n/a"), 0);
        assert_eq!(parse_count("-5"), 0);
        assert_eq!(parse_count("1,000,000"), 1_000_000);
    }

    #[test]
    fn test_row_from_short_cells() {
        let row = StoredRow::from_cells(
            4,
            &strings(&["2024-03-01", "17:15", "Facebook", "https://fb.com/1", "", "1,5"]),
        )
        .unwrap();
        assert_eq!(row.row_number, 4);
        assert_eq!(row.metrics.views, 15);
        assert_eq!(row.metrics.shares, 0);
        assert_eq!(row.platform(), Some(Platform::Facebook));

        assert!(StoredRow::from_cells(5, &strings(&["2024-03-01", "", "", "  "])).is_none());
    }

    #[test]
    fn test_platform_falls_back_to_url() {
        let row = StoredRow::from_cells(2, &strings(&["", "", "", "https://x.com/a/status/1"]))
            .unwrap();
        assert_eq!(row.platform(), Some(Platform::Twitter));
    }

    #[test]
    fn test_record_to_row_layout() {
        let long = PostMetrics {
            caption: "x".repeat(250),
            ..record("https://facebook.com/p/1", 9)
        };
        let row = record_to_row(&long);
        assert_eq!(row.len(), HEADERS.len());
        assert_eq!(row[COL_DATE], CellValue::text("2024-03-01"));
        assert_eq!(row[COL_TIME], CellValue::text("17:15"));
        assert_eq!(row[COL_PLATFORM], CellValue::text("Facebook"));
        assert_eq!(row[COL_CAPTION].to_string().chars().count(), 203);
        assert_eq!(row[COL_METRICS], CellValue::Number(9));

        let short = record_to_row(&record("https://facebook.com/p/1", 9));
        assert_eq!(short[COL_CAPTION], CellValue::text("line one line two"));
    }

    #[test]
    fn test_cell_value_json_shape() {
        let cells = vec![CellValue::text("Views"), CellValue::Number(12)];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"["Views",12]"#);
        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }

    #[tokio::test]
    async fn test_ensure_headers_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SheetStore::new(backend.clone());

        assert!(store.ensure_headers().await.unwrap());
        assert!(!store.ensure_headers().await.unwrap());
        assert_eq!(backend.row_count().await, 1);
    }

    #[tokio::test]
    async fn test_ensure_headers_rewrites_stale_header() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![strings(&["Date", "Time", "URL"])]));
        let store = SheetStore::new(backend.clone());

        assert!(store.ensure_headers().await.unwrap());
        let values = backend.read_values().await.unwrap();
        assert_eq!(values[0], strings(&HEADERS));
    }

    #[tokio::test]
    async fn test_find_update_append() {
        let backend = Arc::new(MemoryBackend::new());
        let store = SheetStore::new(backend.clone());
        store.ensure_headers().await.unwrap();

        let row = store.append(&record("https://www.facebook.com/p/100/posts/555", 10)).await.unwrap();
        assert_eq!(row, 2);

        let found = store
            .find_by_identity("https://facebook.com/p/100/posts/555/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.row_number, 2);
        assert_eq!(found.metrics.views, 10);

        store.update(2, &record("https://facebook.com/other", 25)).await.unwrap();
        let rows = store.read_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metrics.views, 25);
        // identity and caption cells untouched
        assert_eq!(rows[0].post_url, "https://www.facebook.com/p/100/posts/555");
        assert_eq!(rows[0].caption, "line one line two");

        assert!(store.update(1, &record("https://facebook.com/x", 1)).await.is_err());
        assert!(store.find_by_identity("https://facebook.com/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rows_older_than() {
        let backend = Arc::new(MemoryBackend::with_rows(vec![
            strings(&HEADERS),
            strings(&["2024-03-01", "", "Facebook", "https://facebook.com/1"]),
            strings(&["2024-03-09", "", "Facebook", "https://facebook.com/2"]),
            strings(&["someday", "", "Facebook", "https://facebook.com/3"]),
        ]));
        let store = SheetStore::new(backend);
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let old = store.rows_older_than(7, today).await.unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].row_number, 2);

        assert_eq!(store.rows_older_than(0, today).await.unwrap().len(), 2);
    }
}
