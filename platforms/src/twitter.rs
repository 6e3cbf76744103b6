use crate::client::{endpoint, is_permission_error, HttpClient, PlatformClient};
use crate::models::{Platform, PostMetrics, RawPayload, Tweet, TweetList, TweetLookup, UserLookup};
use crate::utils::url_parser::{extract_post_id, DetectedPlatform};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use common::config::TwitterConfig;
use common::Result;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const FULL_TWEET_FIELDS: &str = "created_at,public_metrics,non_public_metrics";
const PUBLIC_TWEET_FIELDS: &str = "created_at,public_metrics";
const MAX_RESULTS: usize = 100;
const MAX_TWEETS: usize = 100;

/// The authenticated account's tweets through the X/Twitter API v2.
pub struct TwitterClient {
    http: HttpClient,
    api_url: String,
    bearer_token: String,
    user_id: OnceCell<String>,
    offset: FixedOffset,
}

impl TwitterClient {
    pub fn new(http: HttpClient, config: &TwitterConfig, offset: FixedOffset) -> Self {
        let user_id = match config.user_id.clone().filter(|id| !id.is_empty()) {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };

        Self {
            http,
            api_url: config.api_url.clone(),
            bearer_token: config.bearer_token.clone(),
            user_id,
            offset,
        }
    }

    async fn api_get<T>(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        let url = endpoint(&self.api_url, segments, params)?;
        self.http.get_json(&url, Some(&self.bearer_token)).await
    }

    /// Configured user id, or the token owner's id resolved once via `/users/me`.
    pub async fn user_id(&self) -> Result<&str> {
        let id = self
            .user_id
            .get_or_try_init(|| async {
                let me: UserLookup = self.api_get(&["users", "me"], &[]).await?;
                debug!(user_id = %me.data.id, "Resolved Twitter user id");
                Ok::<_, common::Error>(me.data.id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn timeline_page(
        &self,
        user_id: &str,
        start_time: &str,
        fields: &str,
        pagination_token: Option<&str>,
    ) -> Result<TweetList> {
        let max_results = MAX_RESULTS.to_string();
        let mut params = vec![
            ("start_time", start_time),
            ("max_results", max_results.as_str()),
            ("tweet.fields", fields),
        ];
        if let Some(token) = pagination_token {
            params.push(("pagination_token", token));
        }

        self.api_get(&["users", user_id, "tweets"], &params).await
    }

    /// Tweets created since `since`. Private impression counts are requested
    /// first and dropped for the rest of the walk once the API refuses them.
    pub async fn get_user_tweets(&self, since: DateTime<Utc>) -> Result<Vec<Tweet>> {
        let user_id = self.user_id().await?;
        let start_time = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut fields = FULL_TWEET_FIELDS;
        let mut tweets = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = match self
                .timeline_page(user_id, &start_time, fields, next_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) if fields == FULL_TWEET_FIELDS && is_permission_error(&e) => {
                    debug!(error = %e, "non_public_metrics refused, using public metrics");
                    fields = PUBLIC_TWEET_FIELDS;
                    continue;
                }
                Err(e) => return Err(e),
            };

            tweets.extend(page.data);
            next_token = page.meta.and_then(|meta| meta.next_token);
            if next_token.is_none() || tweets.len() >= MAX_TWEETS {
                break;
            }
        }

        tweets.truncate(MAX_TWEETS);
        Ok(tweets)
    }

    /// Single tweet lookup with the same private-metrics fallback.
    pub async fn get_tweet(&self, tweet_id: &str) -> Result<Option<Tweet>> {
        for fields in [FULL_TWEET_FIELDS, PUBLIC_TWEET_FIELDS] {
            let lookup: TweetLookup = match self
                .api_get(&["tweets", tweet_id], &[("tweet.fields", fields)])
                .await
            {
                Ok(lookup) => lookup,
                Err(e) if is_permission_error(&e) => {
                    debug!(tweet_id, fields, error = %e, "tweet lookup rejected");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(tweet) = lookup.data {
                return Ok(Some(tweet));
            }
            for problem in &lookup.errors {
                debug!(tweet_id, title = %problem.title, detail = %problem.detail, "tweet lookup problem");
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl PlatformClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn get_posts_with_metrics(&self, since: DateTime<Utc>) -> Result<Vec<PostMetrics>> {
        let tweets = self.get_user_tweets(since).await?;
        info!(count = tweets.len(), "Fetched tweets");

        let mut results = Vec::with_capacity(tweets.len());
        for tweet in tweets {
            let tweet_id = tweet.id.clone();
            match RawPayload::Twitter(tweet).into_metrics(self.offset) {
                Ok(metrics) => results.push(metrics),
                Err(e) => warn!(tweet_id = %tweet_id, error = %e, "skipping tweet"),
            }
        }

        Ok(results)
    }

    async fn get_metrics_for_url(&self, url: &str) -> Result<Option<PostMetrics>> {
        let Some(tweet_id) = extract_post_id(url, Some(DetectedPlatform::Twitter)) else {
            return Ok(None);
        };

        match self.get_tweet(&tweet_id).await? {
            Some(tweet) => RawPayload::Twitter(tweet).into_metrics(self.offset).map(Some),
            None => Ok(None),
        }
    }
}
