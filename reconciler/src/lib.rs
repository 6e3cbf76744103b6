pub mod output;
pub mod processor;
pub mod services;
pub mod sheet;
pub mod storage;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::config::Settings;
use common::{Error, Result};
use platforms::models::Platform;
use processor::BatchOptions;
use services::{PostSource, ReportService};
use tracing_subscriber::EnvFilter;

/// Start of the fetch window.
#[derive(Debug, Clone, Copy)]
pub enum FetchWindow {
    Days(i64),
    Since(NaiveDate),
}

impl FetchWindow {
    /// `Since` dates are midnight in the report timezone.
    pub fn start(&self, settings: &Settings) -> Result<DateTime<Utc>> {
        match self {
            FetchWindow::Days(days) => {
                if *days < 0 {
                    return Err(Error::InvalidInput("--days must not be negative".into()));
                }
                Ok(Utc::now() - Duration::days(*days))
            }
            FetchWindow::Since(date) => {
                let offset = platforms::report_offset(settings)?;
                date.and_hms_opt(0, 0, 0)
                    .and_then(|midnight| midnight.and_local_timezone(offset).single())
                    .map(|start| start.with_timezone(&Utc))
                    .ok_or_else(|| Error::InvalidInput(format!("Invalid start date: {}", date)))
            }
        }
    }
}

/// Logs go to stderr so report output on stdout stays clean. `RUST_LOG`
/// overrides the default `info` level.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub async fn run_fetch(
    config_path: &str,
    window: Option<FetchWindow>,
    platform: Option<Platform>,
) -> Result<()> {
    let settings = Settings::new(config_path)?;
    let window = window.unwrap_or(FetchWindow::Days(settings.days_lookback));
    let since = window.start(&settings)?;

    let source = PostSource::new(&settings)?;
    let posts = source.fetch_all(since, platform).await?;
    print!("{}", output::render_posts(&posts));
    Ok(())
}

pub async fn run_reconcile(
    config_path: &str,
    days: Option<i64>,
    options: BatchOptions,
    json: bool,
) -> Result<()> {
    let settings = Settings::new(config_path)?;
    let since = FetchWindow::Days(days.unwrap_or(settings.days_lookback)).start(&settings)?;

    let service = ReportService::new(&settings).await?;
    println!(
        "Reconciling posts since {} into {}",
        since.date_naive(),
        service.store().describe()
    );
    let summary = service.run(since, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", output::render_summary(&summary));
    }
    Ok(())
}

pub async fn run_update_sheet(
    config_path: &str,
    min_age_days: Option<i64>,
    options: BatchOptions,
    json: bool,
) -> Result<()> {
    let settings = Settings::new(config_path)?;
    let offset = platforms::report_offset(&settings)?;
    let today = Utc::now().with_timezone(&offset).date_naive();

    let service = ReportService::new(&settings).await?;
    let report = service.update_sheet(min_age_days, today, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", output::render_update_report(&report));
    }
    Ok(())
}

pub async fn run_lookup(config_path: &str, url: &str) -> Result<()> {
    let settings = Settings::new(config_path)?;
    let source = PostSource::new(&settings)?;

    match source.lookup(url).await? {
        Some(post) => print!("{}", output::render_posts(std::slice::from_ref(&post))),
        None => println!("No post found for {}", url),
    }
    Ok(())
}

pub fn run_status(config_path: &str) -> Result<()> {
    let settings = Settings::new(config_path)?;
    print!("{}", output::render_status(&services::status(&settings)));
    Ok(())
}
