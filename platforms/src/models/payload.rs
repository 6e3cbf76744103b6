use super::facebook::{FacebookEngagement, FacebookPost};
use super::instagram::{InstagramInsights, InstagramMedia};
use super::metrics::{Platform, PostMetrics};
use super::twitter::Tweet;
use chrono::FixedOffset;
use common::Result;

/// Everything an adapter collected for one post, before normalization.
#[derive(Debug, Clone)]
pub enum RawPayload {
    Facebook {
        post: FacebookPost,
        engagement: FacebookEngagement,
    },
    Instagram {
        media: InstagramMedia,
        insights: InstagramInsights,
    },
    Twitter(Tweet),
}

impl RawPayload {
    pub fn platform(&self) -> Platform {
        match self {
            RawPayload::Facebook { .. } => Platform::Facebook,
            RawPayload::Instagram { .. } => Platform::Instagram,
            RawPayload::Twitter(_) => Platform::Twitter,
        }
    }

    /// Converts into the canonical record with `created_time` in `offset`.
    pub fn into_metrics(self, offset: FixedOffset) -> Result<PostMetrics> {
        match self {
            RawPayload::Facebook { post, engagement } => post.into_metrics(engagement, offset),
            RawPayload::Instagram { media, insights } => media.into_metrics(insights, offset),
            RawPayload::Twitter(tweet) => tweet.into_metrics(offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_platform_tags() {
        let tweet: Tweet = serde_json::from_str(r#"{"id": "1"}"#).unwrap();
        let payload = RawPayload::Twitter(tweet);
        assert_eq!(payload.platform(), Platform::Twitter);

        let metrics = payload.into_metrics(FixedOffset::east_opt(0).unwrap()).unwrap();
        assert_eq!(metrics.platform, Platform::Twitter);
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let post: FacebookPost =
            serde_json::from_str(r#"{"id": "1", "created_time": "yesterday"}"#).unwrap();
        let payload = RawPayload::Facebook {
            post,
            engagement: FacebookEngagement::default(),
        };
        assert!(payload.into_metrics(FixedOffset::east_opt(0).unwrap()).is_err());
    }
}
