use super::metrics::{EngagementMetrics, Platform, PostMetrics};
use crate::utils::time::{parse_platform_timestamp, to_report_time};
use chrono::{FixedOffset, Utc};
use common::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TweetList {
    #[serde(default)]
    pub data: Vec<Tweet>,
    #[serde(default)]
    pub meta: Option<TweetListMeta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TweetListMeta {
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub result_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct TweetLookup {
    #[serde(default)]
    pub data: Option<Tweet>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

/// Partial errors the v2 API returns next to (or instead of) `data`.
#[derive(Debug, Deserialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Deserialize)]
pub struct UserLookup {
    pub data: TwitterUser,
}

#[derive(Debug, Deserialize)]
pub struct TwitterUser {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
    #[serde(default)]
    pub non_public_metrics: Option<NonPublicMetrics>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub quote_count: u64,
    #[serde(default)]
    pub impression_count: u64,
}

/// Only present with user-context auth on the author's own tweets.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct NonPublicMetrics {
    #[serde(default)]
    pub impression_count: u64,
}

pub fn status_url(tweet_id: &str) -> String {
    format!("https://twitter.com/i/web/status/{}", tweet_id)
}

impl Tweet {
    pub fn impressions(&self) -> u64 {
        self.non_public_metrics
            .map(|m| m.impression_count)
            .filter(|count| *count > 0)
            .unwrap_or(self.public_metrics.impression_count)
    }

    pub fn into_metrics(self, offset: FixedOffset) -> Result<PostMetrics> {
        let created = match self.created_at.as_deref() {
            Some(raw) => parse_platform_timestamp(raw)?,
            None => Utc::now().fixed_offset(),
        };
        let public = self.public_metrics;
        let impressions = self.impressions();

        Ok(PostMetrics {
            post_url: status_url(&self.id),
            post_id: self.id,
            platform: Platform::Twitter,
            created_time: to_report_time(created, offset),
            caption: self.text,
            metrics: EngagementMetrics {
                views: impressions,
                interactions: public.like_count
                    + public.retweet_count
                    + public.reply_count
                    + public.quote_count,
                reach: impressions,
                follows: 0,
                link_clicks: 0,
                likes: public.like_count,
                comments: public.reply_count,
                shares: public.retweet_count + public.quote_count,
            },
        })
    }
}
