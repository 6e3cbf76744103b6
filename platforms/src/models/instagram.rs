use super::graph::InsightsResponse;
use super::metrics::{EngagementMetrics, Platform, PostMetrics};
use crate::utils::time::{parse_platform_timestamp, to_report_time};
use chrono::{DateTime, FixedOffset};
use common::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct InstagramMedia {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comments_count: u64,
}

impl InstagramMedia {
    pub fn is_video(&self) -> bool {
        matches!(self.media_type.as_deref(), Some("VIDEO") | Some("REELS"))
    }

    /// Insight metrics valid for this media type.
    pub fn insight_metrics(&self) -> &'static str {
        if self.is_video() {
            "impressions,reach,saved,video_views"
        } else {
            "impressions,reach,saved"
        }
    }

    pub fn published_at(&self) -> Result<DateTime<FixedOffset>> {
        parse_platform_timestamp(&self.timestamp)
    }

    pub fn into_metrics(
        self,
        insights: InstagramInsights,
        offset: FixedOffset,
    ) -> Result<PostMetrics> {
        let created = self.published_at()?;
        let post_url = self
            .permalink
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("https://instagram.com/p/{}", self.id));

        Ok(PostMetrics {
            post_id: self.id,
            post_url,
            platform: Platform::Instagram,
            created_time: to_report_time(created, offset),
            caption: self.caption.unwrap_or_default(),
            metrics: EngagementMetrics {
                views: insights.impressions,
                interactions: self.like_count + self.comments_count + insights.saved,
                reach: insights.reach,
                follows: 0,
                link_clicks: 0,
                likes: self.like_count,
                comments: self.comments_count,
                shares: 0,
            },
        })
    }
}

/// Media insights; all zero when `instagram_manage_insights` is not granted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InstagramInsights {
    pub impressions: u64,
    pub reach: u64,
    pub saved: u64,
    pub video_views: u64,
}

impl From<&InsightsResponse> for InstagramInsights {
    fn from(response: &InsightsResponse) -> Self {
        Self {
            impressions: response.value_of("impressions"),
            reach: response.value_of("reach"),
            saved: response.value_of("saved"),
            video_views: response.value_of("video_views"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media_json() -> &'static str {
        r#"{
            "id": "17900001",
            "caption": "Behind the scenes\nDay 2",
            "media_type": "REELS",
            "permalink": "https://www.instagram.com/reel/Cx12_ab/",
            "timestamp": "2024-03-02T23:30:00+0000",
            "like_count": 120,
            "comments_count": 9
        }"#
    }

    #[test]
    fn test_conversion_with_insights() {
        let media: InstagramMedia = serde_json::from_str(media_json()).unwrap();
        assert!(media.is_video());
        assert!(media.insight_metrics().ends_with("video_views"));

        let insights = InstagramInsights {
            impressions: 2000,
            reach: 1500,
            saved: 11,
            video_views: 1800,
        };
        let metrics = media
            .into_metrics(insights, FixedOffset::east_opt(7 * 3600).unwrap())
            .unwrap();

        assert_eq!(metrics.platform, Platform::Instagram);
        assert_eq!(metrics.date_string(), "2024-03-03");
        assert_eq!(metrics.time_string(), "06:30");
        assert_eq!(metrics.metrics.views, 2000);
        assert_eq!(metrics.metrics.interactions, 140);
        assert_eq!(metrics.metrics.shares, 0);
        assert_eq!(metrics.caption, "Behind the scenes\nDay 2");
    }

    #[test]
    fn test_conversion_without_insights_permission() {
        let media: InstagramMedia = serde_json::from_str(
            r#"{"id": "1", "timestamp": "2024-03-02T00:00:00+0000"}"#,
        )
        .unwrap();
        assert!(!media.is_video());

        let metrics = media
            .into_metrics(InstagramInsights::default(), FixedOffset::east_opt(0).unwrap())
            .unwrap();
        assert_eq!(metrics.metrics, EngagementMetrics::default());
        assert_eq!(metrics.post_url, "https://instagram.com/p/1");
    }
}
