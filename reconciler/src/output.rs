//! Plain-text rendering of command results.

use crate::processor::{BatchSummary, RecordOutcome};
use crate::services::{StatusReport, UpdateSheetReport};
use platforms::models::{truncate_caption, EngagementMetrics, PostMetrics};
use std::fmt::Write;

const METRIC_LABELS: [&str; EngagementMetrics::FIELD_COUNT] = [
    "Views",
    "Interactions",
    "Reach",
    "Follows",
    "Link Clicks",
    "Likes",
    "Comments",
    "Shares",
];

/// `1234567` → `1,234,567`
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn metrics_line(metrics: &EngagementMetrics) -> String {
    METRIC_LABELS
        .iter()
        .zip(metrics.to_array())
        .map(|(label, value)| format!("{}: {}", label, format_count(value)))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn changes_line(before: &EngagementMetrics, after: &EngagementMetrics) -> String {
    let changed: Vec<String> = METRIC_LABELS
        .iter()
        .zip(before.to_array().into_iter().zip(after.to_array()))
        .filter(|(_, (old, new))| old != new)
        .map(|(label, (old, new))| {
            format!("{}: {} -> {}", label, format_count(old), format_count(new))
        })
        .collect();

    if changed.is_empty() {
        "no changes".to_string()
    } else {
        changed.join(", ")
    }
}

pub fn render_posts(posts: &[PostMetrics]) -> String {
    let mut out = String::new();
    if posts.is_empty() {
        out.push_str("No posts found.\n");
        return out;
    }

    for post in posts {
        let _ = writeln!(
            out,
            "[{}] {} {}  {}",
            post.platform.display_name(),
            post.date_string(),
            post.time_string(),
            post.post_url
        );
        if !post.caption.is_empty() {
            let _ = writeln!(out, "  {}", truncate_caption(&post.caption, 80));
        }
        let _ = writeln!(out, "  {}", metrics_line(&post.metrics));
    }
    let _ = writeln!(out, "\n{} post(s)", posts.len());
    out
}

pub fn render_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();
    if summary.dry_run {
        out.push_str("DRY RUN - no changes written\n");
    }

    for outcome in &summary.details {
        let _ = match outcome {
            RecordOutcome::WouldUpdate {
                url,
                row,
                before,
                after,
            } => writeln!(
                out,
                "  ~ row {} {}\n      {}",
                row,
                url,
                changes_line(before, after)
            ),
            RecordOutcome::WouldAdd {
                url,
                platform,
                metrics,
            } => writeln!(
                out,
                "  + [{}] {}\n      {}",
                platform.display_name(),
                url,
                metrics_line(metrics)
            ),
            RecordOutcome::Updated { url, row } => writeln!(out, "  ~ row {} {}", row, url),
            RecordOutcome::Added { url, row } => writeln!(out, "  + row {} {}", row, url),
            RecordOutcome::Failed { url, error } => writeln!(out, "  ! {} ({})", url, error),
        };
    }

    let (updated, added) = if summary.dry_run {
        ("Would update", "Would add")
    } else {
        ("Updated", "Added")
    };
    let _ = write!(
        out,
        "{}: {}  {}: {}  Skipped: {}",
        updated, summary.updated, added, summary.added, summary.skipped
    );
    if summary.failed > 0 {
        let _ = write!(out, "  Failed: {}", summary.failed);
    }
    out.push('\n');
    out
}

pub fn render_update_report(report: &UpdateSheetReport) -> String {
    let mut out = render_summary(&report.summary);
    if !report.unresolved.is_empty() {
        let _ = writeln!(out, "Could not refresh {} row(s):", report.unresolved.len());
        for row in &report.unresolved {
            let _ = writeln!(out, "  row {} {} ({})", row.row, row.url, row.reason);
        }
    }
    out
}

pub fn render_status(status: &StatusReport) -> String {
    let mut out = String::from("Platforms:\n");
    for (platform, enabled) in &status.platforms {
        let _ = writeln!(
            out,
            "  {:<10} {}",
            platform.display_name(),
            if *enabled { "configured" } else { "not configured" }
        );
    }
    let _ = writeln!(
        out,
        "Row store: {:?} ({})",
        status.backend,
        if status.sheet_configured {
            "configured"
        } else {
            "not configured"
        }
    );
    let _ = writeln!(out, "Default lookback: {} day(s)", status.days_lookback);
    let _ = writeln!(out, "Report timezone: UTC{:+}", status.report_utc_offset_hours);
    out
}
