use crate::models::{Platform, PostMetrics};
use crate::utils::retry::retry_with_backoff;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::HttpConfig;
use common::{Error, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Source of canonical post records for one platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Posts published at or after `since`, each with its current metrics.
    async fn get_posts_with_metrics(&self, since: DateTime<Utc>) -> Result<Vec<PostMetrics>>;

    /// Metrics for the post behind `url`, or `None` when the URL does not
    /// resolve to a post this account can see.
    async fn get_metrics_for_url(&self, url: &str) -> Result<Option<PostMetrics>>;
}

/// Shared JSON-over-HTTP client for the platform APIs.
#[derive(Clone)]
pub struct HttpClient {
    client: rquest::Client,
    max_retries: u32,
    retry_base_delay_ms: u64,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = rquest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
        })
    }

    /// GETs `url` and decodes the JSON body, retrying transient failures.
    pub async fn get_json<T>(&self, url: &Url, bearer: Option<&str>) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let client = self;
        retry_with_backoff(self.max_retries, self.retry_base_delay_ms, move || async move {
            client.get_once::<T>(url, bearer).await
        })
        .await
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &Url, bearer: Option<&str>) -> Result<T> {
        let mut request = self.client.get(url.as_str());
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // path only: Graph API tokens travel in the query string
            debug!(status = status.as_u16(), path = url.path(), "API request failed");
            return Err(Error::from_status(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Appends `segments` to `base` (each one percent-encoded) and sets `query`.
pub fn endpoint(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| Error::InvalidInput(format!("Cannot use {} as a base URL", base)))?
        .pop_if_empty()
        .extend(segments);

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    Ok(url)
}

/// Client errors meaning "this account may not see that", as opposed to
/// outages. Callers degrade to zeros or `None` on these.
pub fn is_permission_error(error: &Error) -> bool {
    match error {
        Error::Forbidden | Error::Unauthorized => true,
        Error::Api { status, .. } => (400..500).contains(status),
        _ => false,
    }
}
