use crate::client::{endpoint, is_permission_error, HttpClient, PlatformClient};
use crate::models::{
    FacebookEngagement, FacebookEngagementFields, FacebookPost, GraphPage, InsightsResponse,
    Platform, PostMetrics, RawPayload,
};
use crate::utils::url_parser::{extract_post_id, DetectedPlatform};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use common::config::MetaConfig;
use common::{Error, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

const POST_FIELDS: &str = "id,message,created_time,permalink_url,shares";
const LOOKUP_FIELDS: &str = "id,message,created_time,permalink_url";
const REACTION_FIELDS: &str = "shares,reactions.summary(total_count),comments.summary(total_count)";
const LIKE_FIELDS: &str = "shares,likes.summary(total_count),comments.summary(total_count)";
const INSIGHT_METRICS: &str = "post_impressions,post_impressions_unique,post_clicks";
const PAGE_LIMIT: usize = 100;
const MAX_POSTS: usize = 100;

/// Page posts through the Facebook Graph API.
pub struct FacebookClient {
    http: HttpClient,
    base_url: String,
    access_token: String,
    page_id: String,
    try_insights: bool,
    offset: FixedOffset,
}

impl FacebookClient {
    pub fn new(http: HttpClient, config: &MetaConfig, offset: FixedOffset) -> Result<Self> {
        let page_id = config
            .facebook_page_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidInput("facebook_page_id is not configured".into()))?;

        Ok(Self {
            http,
            base_url: config.graph_api_url.clone(),
            access_token: config.access_token.clone(),
            page_id,
            try_insights: config.try_insights,
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

    /// Page posts created since `since`, following cursor pagination.
    pub async fn get_page_posts(&self, since: DateTime<Utc>) -> Result<Vec<FacebookPost>> {
        let since = since.timestamp().to_string();
        let limit = PAGE_LIMIT.to_string();
        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut params = vec![
                ("fields", POST_FIELDS),
                ("limit", limit.as_str()),
                ("since", since.as_str()),
            ];
            if let Some(cursor) = after.as_deref() {
                params.push(("after", cursor));
            }

            let page: GraphPage<FacebookPost> =
                self.graph_get(&[self.page_id.as_str(), "posts"], &params).await?;
            posts.extend(page.data);

            after = page.paging.and_then(|p| p.next_cursor());
            if after.is_none() || posts.len() >= MAX_POSTS {
                break;
            }
        }

        posts.truncate(MAX_POSTS);
        Ok(posts)
    }

    /// Likes, comments and shares for one post, trying progressively less
    /// demanding field sets. `None` when the token can read none of them.
    pub async fn get_engagement(&self, post_id: &str) -> Option<FacebookEngagement> {
        let object_id = post_id.rsplit('_').next().unwrap_or(post_id);
        let mut attempts = vec![
            (object_id, REACTION_FIELDS),
            (post_id, REACTION_FIELDS),
            (post_id, LIKE_FIELDS),
            (post_id, "shares"),
        ];
        attempts.dedup();

        for (id, fields) in attempts {
            match self
                .graph_get::<FacebookEngagementFields>(&[id], &[("fields", fields)])
                .await
            {
                Ok(found) => return Some(FacebookEngagement::from_fields(&found)),
                Err(e) => debug!(post_id = id, fields, error = %e, "engagement query rejected"),
            }
        }

        None
    }

    /// Post insights; needs `read_insights`, so a rejection is expected.
    pub async fn get_insights(&self, post_id: &str) -> Option<InsightsResponse> {
        match self
            .graph_get(&[post_id, "insights"], &[("metric", INSIGHT_METRICS)])
            .await
        {
            Ok(insights) => Some(insights),
            Err(e) => {
                debug!(post_id, error = %e, "insights unavailable");
                None
            }
        }
    }

    async fn collect(&self, post: FacebookPost) -> Result<PostMetrics> {
        let mut engagement = match self.get_engagement(&post.id).await {
            Some(engagement) => engagement,
            None => FacebookEngagement::from_post(&post),
        };
        if self.try_insights {
            if let Some(insights) = self.get_insights(&post.id).await {
                engagement.apply_insights(&insights);
            }
        }

        RawPayload::Facebook { post, engagement }.into_metrics(self.offset)
    }
}

#[async_trait]
impl PlatformClient for FacebookClient {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn get_posts_with_metrics(&self, since: DateTime<Utc>) -> Result<Vec<PostMetrics>> {
        let posts = self.get_page_posts(since).await?;
        info!(page_id = %self.page_id, count = posts.len(), "Fetched Facebook posts");

        let mut results = Vec::with_capacity(posts.len());
        for post in posts {
            let post_id = post.id.clone();
            match self.collect(post).await {
                Ok(metrics) => results.push(metrics),
                Err(e) => warn!(post_id = %post_id, error = %e, "skipping Facebook post"),
            }
        }

        Ok(results)
    }

    async fn get_metrics_for_url(&self, url: &str) -> Result<Option<PostMetrics>> {
        let Some(numeric_id) = extract_post_id(url, Some(DetectedPlatform::Facebook)) else {
            return Ok(None);
        };
        let post_id = format!("{}_{}", self.page_id, numeric_id);

        let mut post: FacebookPost = match self
            .graph_get(&[post_id.as_str()], &[("fields", LOOKUP_FIELDS)])
            .await
        {
            Ok(post) => post,
            Err(e) if is_permission_error(&e) => {
                debug!(post_id = %post_id, error = %e, "post lookup rejected");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if post.permalink_url.as_deref().is_none_or(str::is_empty) {
            post.permalink_url = Some(url.to_string());
        }

        self.collect(post).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::HttpConfig;

    fn http() -> HttpClient {
        HttpClient::new(&HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_requires_page_id() {
        let config = MetaConfig {
            access_token: "token".into(),
            ..MetaConfig::default()
        };
        let offset = FixedOffset::east_opt(0).unwrap();
        assert!(FacebookClient::new(http(), &config, offset).is_err());

        let config = MetaConfig {
            facebook_page_id: Some("100".into()),
            ..config
        };
        let client = FacebookClient::new(http(), &config, offset).unwrap();
        assert_eq!(client.platform(), Platform::Facebook);
    }

    #[tokio::test]
    async fn test_url_without_post_id_is_none() {
        let config = MetaConfig {
            access_token: "token".into(),
            facebook_page_id: Some("100".into()),
            ..MetaConfig::default()
        };
        let client =
            FacebookClient::new(http(), &config, FixedOffset::east_opt(0).unwrap()).unwrap();
        let found = client
            .get_metrics_for_url("https://www.facebook.com/somepage")
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
