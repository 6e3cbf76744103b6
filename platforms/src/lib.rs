pub mod client;
pub mod facebook;
pub mod instagram;
pub mod models;
pub mod twitter;
pub mod utils;

use chrono::FixedOffset;
use client::{HttpClient, PlatformClient};
use common::config::Settings;
use common::{Error, Result};
use facebook::FacebookClient;
use instagram::InstagramClient;
use std::sync::Arc;
use twitter::TwitterClient;

pub use models::{EngagementMetrics, Platform, PostMetrics, RawPayload};

/// Builds one client per platform that has credentials configured.
pub fn build_clients(settings: &Settings) -> Result<Vec<Arc<dyn PlatformClient>>> {
    let offset = report_offset(settings)?;
    let http = HttpClient::new(&settings.http)?;
    let mut clients: Vec<Arc<dyn PlatformClient>> = Vec::new();

    if settings.facebook_enabled() {
        clients.push(Arc::new(FacebookClient::new(
            http.clone(),
            &settings.meta,
            offset,
        )?));
    }
    if settings.instagram_enabled() {
        clients.push(Arc::new(InstagramClient::new(
            http.clone(),
            &settings.meta,
            offset,
        )?));
    }
    if settings.twitter_enabled() {
        clients.push(Arc::new(TwitterClient::new(
            http.clone(),
            &settings.twitter,
            offset,
        )));
    }

    Ok(clients)
}

pub fn report_offset(settings: &Settings) -> Result<FixedOffset> {
    settings.report_offset().ok_or_else(|| {
        Error::InvalidInput(format!(
            "report_utc_offset_hours out of range: {}",
            settings.report_utc_offset_hours
        ))
    })
}
