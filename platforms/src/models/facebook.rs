use super::graph::{InsightsResponse, SummaryEdge};
use super::metrics::{EngagementMetrics, Platform, PostMetrics};
use crate::utils::time::{parse_platform_timestamp, to_report_time};
use chrono::FixedOffset;
use common::Result;
use serde::Deserialize;

/// A page post as returned by `/{page_id}/posts` or a single post lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookPost {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    pub created_time: String,
    #[serde(default)]
    pub permalink_url: Option<String>,
    #[serde(default)]
    pub shares: Option<ShareCount>,
    #[serde(default)]
    pub reactions: Option<SummaryEdge>,
    #[serde(default)]
    pub likes: Option<SummaryEdge>,
    #[serde(default)]
    pub comments: Option<SummaryEdge>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ShareCount {
    #[serde(default)]
    pub count: u64,
}

/// Engagement fields requested on their own when the listing did not carry them.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FacebookEngagementFields {
    #[serde(default)]
    pub shares: Option<ShareCount>,
    #[serde(default)]
    pub reactions: Option<SummaryEdge>,
    #[serde(default)]
    pub likes: Option<SummaryEdge>,
    #[serde(default)]
    pub comments: Option<SummaryEdge>,
}

/// Counts gathered for one post from whichever endpoints the token could read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FacebookEngagement {
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub views: u64,
    pub reach: u64,
    pub link_clicks: u64,
}

impl FacebookEngagement {
    /// Reactions win over the legacy `likes` edge when both are present.
    pub fn from_fields(fields: &FacebookEngagementFields) -> Self {
        let reactions = SummaryEdge::total(&fields.reactions);
        Self {
            likes: if fields.reactions.is_some() {
                reactions
            } else {
                SummaryEdge::total(&fields.likes)
            },
            comments: SummaryEdge::total(&fields.comments),
            shares: fields.shares.as_ref().map(|s| s.count).unwrap_or(0),
            ..Self::default()
        }
    }

    pub fn from_post(post: &FacebookPost) -> Self {
        Self::from_fields(&FacebookEngagementFields {
            shares: post.shares.clone(),
            reactions: post.reactions.clone(),
            likes: post.likes.clone(),
            comments: post.comments.clone(),
        })
    }

    pub fn apply_insights(&mut self, insights: &InsightsResponse) {
        self.views = insights.value_of("post_impressions");
        self.reach = insights.value_of("post_impressions_unique");
        self.link_clicks = insights.value_of("post_clicks");
    }

    pub fn to_metrics(&self) -> EngagementMetrics {
        EngagementMetrics {
            views: self.views,
            interactions: self.likes + self.comments + self.shares,
            reach: self.reach,
            follows: 0,
            link_clicks: self.link_clicks,
            likes: self.likes,
            comments: self.comments,
            shares: self.shares,
        }
    }
}

impl FacebookPost {
    pub fn into_metrics(
        self,
        engagement: FacebookEngagement,
        offset: FixedOffset,
    ) -> Result<PostMetrics> {
        let created = parse_platform_timestamp(&self.created_time)?;
        let post_url = self
            .permalink_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("https://facebook.com/{}", self.id));

        Ok(PostMetrics {
            post_id: self.id,
            post_url,
            platform: Platform::Facebook,
            created_time: to_report_time(created, offset),
            caption: self.message.unwrap_or_default(),
            metrics: engagement.to_metrics(),
        })
    }
}
