use crate::client::{endpoint, HttpClient, PlatformClient};
use crate::models::{
    GraphPage, InsightsResponse, InstagramInsights, InstagramMedia, Platform, PostMetrics,
    RawPayload,
};
use crate::utils::url_parser::{extract_post_id, DetectedPlatform};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use common::config::MetaConfig;
use common::{Error, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

const MEDIA_FIELDS: &str = "id,caption,media_type,permalink,timestamp,like_count,comments_count";
const PAGE_SIZE: usize = 50;
const MAX_MEDIA: usize = 100;
const LOOKUP_SCAN_LIMIT: usize = 200;

/// Business account media through the Instagram Graph API.
pub struct InstagramClient {
    http: HttpClient,
    base_url: String,
    access_token: String,
    account_id: String,
    offset: FixedOffset,
}

impl InstagramClient {
    pub fn new(http: HttpClient, config: &MetaConfig, offset: FixedOffset) -> Result<Self> {
        let account_id = config
            .instagram_account_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidInput("instagram_account_id is not configured".into()))?;

        Ok(Self {
            http,
            base_url: config.graph_api_url.clone(),
            access_token: config.access_token.clone(),
            account_id,
            offset,
        })
    }

    async fn graph_get<T>(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let mut query = params.to_vec();
        query.push(("access_token", self.access_token.as_str()));
        let url = endpoint(&self.base_url, segments, &query)?;
        self.http.get_json(&url, None).await
    }

    /// Most recent media first, up to `limit` items. With `since`, stops at
    /// the first item published before it.
    pub async fn get_media(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<InstagramMedia>> {
        let page_size = PAGE_SIZE.min(limit).to_string();
        let mut media = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut params = vec![("fields", MEDIA_FIELDS), ("limit", page_size.as_str())];
            if let Some(cursor) = after.as_deref() {
                params.push(("after", cursor));
            }

            let page: GraphPage<InstagramMedia> = self
                .graph_get(&[self.account_id.as_str(), "media"], &params)
                .await?;

            for item in page.data {
                if let (Some(since), Ok(published)) = (since, item.published_at()) {
                    if published.with_timezone(&Utc) < since {
                        return Ok(media);
                    }
                }
                media.push(item);
                if media.len() >= limit {
                    return Ok(media);
                }
            }

            after = page.paging.and_then(|p| p.next_cursor());
            if after.is_none() {
                return Ok(media);
            }
        }
    }

    /// Media insights, or zeros when `instagram_manage_insights` is missing.
    pub async fn get_insights(&self, media: &InstagramMedia) -> InstagramInsights {
        match self
            .graph_get::<InsightsResponse>(
                &[media.id.as_str(), "insights"],
                &[("metric", media.insight_metrics())],
            )
            .await
        {
            Ok(response) => InstagramInsights::from(&response),
            Err(e) => {
                debug!(media_id = %media.id, error = %e, "insights unavailable");
                InstagramInsights::default()
            }
        }
    }

    async fn collect(&self, media: InstagramMedia) -> Result<PostMetrics> {
        let insights = self.get_insights(&media).await;
        RawPayload::Instagram { media, insights }.into_metrics(self.offset)
    }
}

#[async_trait]
impl PlatformClient for InstagramClient {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn get_posts_with_metrics(&self, since: DateTime<Utc>) -> Result<Vec<PostMetrics>> {
        let media = self.get_media(Some(since), MAX_MEDIA).await?;
        info!(account_id = %self.account_id, count = media.len(), "Fetched Instagram media");

        let mut results = Vec::with_capacity(media.len());
        for item in media {
            let media_id = item.id.clone();
            match self.collect(item).await {
                Ok(metrics) => results.push(metrics),
                Err(e) => warn!(media_id = %media_id, error = %e, "skipping Instagram media"),
            }
        }

        Ok(results)
    }

    /// The API cannot look media up by shortcode, so recent media are
    /// scanned for a permalink containing it.
    async fn get_metrics_for_url(&self, url: &str) -> Result<Option<PostMetrics>> {
        let Some(shortcode) = extract_post_id(url, Some(DetectedPlatform::Instagram)) else {
            return Ok(None);
        };

        let media = self.get_media(None, LOOKUP_SCAN_LIMIT).await?;
        let found = media.into_iter().find(|item| {
            item.permalink
                .as_deref()
                .is_some_and(|permalink| permalink.contains(&shortcode))
        });

        match found {
            Some(item) => self.collect(item).await.map(Some),
            None => {
                debug!(shortcode = %shortcode, scanned = LOOKUP_SCAN_LIMIT, "shortcode not among recent media");
                Ok(None)
            }
        }
    }
}
