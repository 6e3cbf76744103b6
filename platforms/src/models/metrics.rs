use chrono::{DateTime, FixedOffset};
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Platforms the reconciler can fetch metrics from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    Twitter,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Facebook, Platform::Instagram, Platform::Twitter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
        }
    }

    /// Capitalized name written to the `Platform` column.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::Twitter => "Twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(Error::InvalidInput(format!("Unknown platform: {}", other))),
        }
    }
}

/// The eight numeric metrics, in sheet column order.
///
/// Every field defaults to zero: a metric the token is not allowed to read is
/// indistinguishable from a metric that really is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    pub views: u64,
    pub interactions: u64,
    pub reach: u64,
    pub follows: u64,
    pub link_clicks: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
}

impl EngagementMetrics {
    pub const FIELD_COUNT: usize = 8;

    pub fn to_array(&self) -> [u64; Self::FIELD_COUNT] {
        [
            self.views,
            self.interactions,
            self.reach,
            self.follows,
            self.link_clicks,
            self.likes,
            self.comments,
            self.shares,
        ]
    }

    pub fn from_array(values: [u64; Self::FIELD_COUNT]) -> Self {
        let [views, interactions, reach, follows, link_clicks, likes, comments, shares] = values;
        Self {
            views,
            interactions,
            reach,
            follows,
            link_clicks,
            likes,
            comments,
            shares,
        }
    }
}

/// One post's metrics in the shape every platform adapter produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub post_id: String,
    pub post_url: String,
    pub platform: Platform,
    /// Already shifted into the report timezone.
    pub created_time: DateTime<FixedOffset>,
    pub caption: String,
    #[serde(flatten)]
    pub metrics: EngagementMetrics,
}

impl PostMetrics {
    pub fn date_string(&self) -> String {
        self.created_time.format("%Y-%m-%d").to_string()
    }

    pub fn time_string(&self) -> String {
        self.created_time.format("%H:%M").to_string()
    }
}

/// Cuts on character boundaries and flattens newlines so the result fits one cell.
pub fn truncate_caption(caption: &str, max_chars: usize) -> String {
    let mut truncated: String = caption.chars().take(max_chars).collect();
    if caption.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip_names() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
            assert_eq!(
                platform.display_name().parse::<Platform>().unwrap(),
                platform
            );
        }
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
        assert!("tiktok".parse::<Platform>().is_err());
    }

    #[test]
    fn test_metrics_column_order() {
        let metrics = EngagementMetrics {
            views: 1,
            interactions: 2,
            reach: 3,
            follows: 4,
            link_clicks: 5,
            likes: 6,
            comments: 7,
            shares: 8,
        };
        assert_eq!(metrics.to_array(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(EngagementMetrics::from_array(metrics.to_array()), metrics);
    }

    #[test]
    fn test_truncate_caption() {
        assert_eq!(truncate_caption("short", 10), "short");
        assert_eq!(truncate_caption("line one\nline two", 100), "line one line two");
        assert_eq!(truncate_caption("abcdef", 3), "abc...");
        // multi-byte characters are never split
        assert_eq!(truncate_caption("สวัสดีครับ", 3), "สวั...");
    }
}
