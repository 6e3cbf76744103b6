// Envelope types shared by the Facebook and Instagram Graph API responses.
use serde::Deserialize;
use serde_json::Value;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub cursors: Option<Cursors>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Cursors {
    #[serde(default)]
    pub after: Option<String>,
}

impl Paging {
    /// Cursor for the following page, or `None` on the last page.
    pub fn next_cursor(&self) -> Option<String> {
        let next = self.next.as_deref()?;
        if let Some(after) = self.cursors.as_ref().and_then(|c| c.after.clone()) {
            return Some(after);
        }
        Url::parse(next)
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == "after")
            .map(|(_, value)| value.into_owned())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InsightsResponse {
    #[serde(default)]
    pub data: Vec<InsightMetric>,
}

#[derive(Debug, Deserialize)]
pub struct InsightMetric {
    pub name: String,
    #[serde(default)]
    pub values: Vec<InsightValue>,
}

#[derive(Debug, Deserialize)]
pub struct InsightValue {
    #[serde(default)]
    pub value: Value,
}

impl InsightsResponse {
    /// First value of the named metric; anything non-numeric counts as zero.
    pub fn value_of(&self, name: &str) -> u64 {
        self.data
            .iter()
            .find(|metric| metric.name == name)
            .and_then(|metric| metric.values.first())
            .and_then(|value| value.value.as_u64())
            .unwrap_or(0)
    }
}

/// `{"summary": {"total_count": N}}` edges (reactions, comments, likes).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SummaryEdge {
    #[serde(default)]
    pub summary: Option<Summary>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub total_count: u64,
}

impl SummaryEdge {
    pub fn total(edge: &Option<SummaryEdge>) -> u64 {
        edge.as_ref()
            .and_then(|e| e.summary.as_ref())
            .map(|s| s.total_count)
            .unwrap_or(0)
    }
}
