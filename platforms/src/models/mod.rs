mod facebook;
mod graph;
mod instagram;
mod metrics;
mod payload;
mod twitter;

pub use facebook::{FacebookEngagement, FacebookEngagementFields, FacebookPost, ShareCount};
pub use graph::{GraphPage, InsightsResponse, Paging, SummaryEdge};
pub use instagram::{InstagramInsights, InstagramMedia};
pub use metrics::{truncate_caption, EngagementMetrics, Platform, PostMetrics};
pub use payload::RawPayload;
pub use twitter::{status_url, Tweet, TweetList, TweetLookup, UserLookup};
