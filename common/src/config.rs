use chrono::FixedOffset;
use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Plain environment variable names understood in addition to the
/// `APP_`-prefixed ones, mapped onto their settings keys.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("META_ACCESS_TOKEN", "meta.access_token"),
    ("FACEBOOK_PAGE_ID", "meta.facebook_page_id"),
    ("INSTAGRAM_ACCOUNT_ID", "meta.instagram_account_id"),
    ("TWITTER_BEARER_TOKEN", "twitter.bearer_token"),
    ("TWITTER_USER_ID", "twitter.user_id"),
    ("GOOGLE_SHEET_ID", "sheets.sheet_id"),
    ("GOOGLE_SHEET_NAME", "sheets.sheet_name"),
    ("GOOGLE_ACCESS_TOKEN", "sheets.access_token"),
    ("DEFAULT_DAYS_LOOKBACK", "days_lookback"),
];

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub meta: MetaConfig,
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_days_lookback")]
    pub days_lookback: i64,
    /// Fixed UTC offset every timestamp is normalized to before display.
    #[serde(default = "default_report_utc_offset_hours")]
    pub report_utc_offset_hours: i32,
}

/// Facebook and Instagram share one Graph API token.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetaConfig {
    pub access_token: String,
    pub facebook_page_id: Option<String>,
    pub instagram_account_id: Option<String>,
    pub graph_api_url: String,
    /// Query `/insights` for views/reach/clicks. Needs `read_insights`.
    pub try_insights: bool,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            facebook_page_id: None,
            instagram_account_id: None,
            graph_api_url: "https://graph.facebook.com/v18.0".to_string(),
            try_insights: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TwitterConfig {
    pub bearer_token: String,
    pub user_id: Option<String>,
    pub api_url: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token: String::new(),
            user_id: None,
            api_url: "https://api.twitter.com/2".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SheetBackendKind {
    #[default]
    Google,
    S3,
    Local,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SheetsConfig {
    pub backend: SheetBackendKind,
    pub sheet_id: String,
    pub sheet_name: String,
    /// OAuth access token with the spreadsheets scope, minted outside this tool.
    pub access_token: String,
    pub api_url: String,
    pub s3: S3SheetConfig,
    /// File used by the `local` backend.
    pub local_path: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            backend: SheetBackendKind::Google,
            sheet_id: String::new(),
            sheet_name: "Sheet1".to_string(),
            access_token: String::new(),
            api_url: "https://sheets.googleapis.com/v4".to_string(),
            s3: S3SheetConfig::default(),
            local_path: "data/sheet.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct S3SheetConfig {
    pub endpoint: Option<String>,
    pub region: String,
    /// Empty keys fall back to the default AWS credential chain.
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub key: String,
}

impl Default for S3SheetConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_s3_region(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: "social-report".to_string(),
            key: "sheets/report.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

fn default_days_lookback() -> i64 {
    7
}

fn default_report_utc_offset_hours() -> i32 {
    7
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            meta: MetaConfig::default(),
            twitter: TwitterConfig::default(),
            sheets: SheetsConfig::default(),
            http: HttpConfig::default(),
            days_lookback: default_days_lookback(),
            report_utc_offset_hours: default_report_utc_offset_hours(),
        }
    }
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    builder = builder.set_override(*key, value)?;
                }
            }
        }

        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        debug!(
            platforms = ?settings.enabled_platforms(),
            backend = ?settings.sheets.backend,
            "Loaded settings"
        );

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.report_offset().is_none() {
            return Err(ConfigError::Message(format!(
                "report_utc_offset_hours out of range: {}",
                self.report_utc_offset_hours
            )));
        }
        if self.days_lookback < 0 {
            return Err(ConfigError::Message(
                "days_lookback must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn report_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.report_utc_offset_hours.checked_mul(3600)?)
    }

    pub fn facebook_enabled(&self) -> bool {
        !self.meta.access_token.is_empty() && non_empty(&self.meta.facebook_page_id)
    }

    pub fn instagram_enabled(&self) -> bool {
        !self.meta.access_token.is_empty() && non_empty(&self.meta.instagram_account_id)
    }

    pub fn twitter_enabled(&self) -> bool {
        !self.twitter.bearer_token.is_empty()
    }

    /// Whether the configured sheet backend has what it needs to connect.
    pub fn sheets_configured(&self) -> bool {
        match self.sheets.backend {
            SheetBackendKind::Google => {
                !self.sheets.sheet_id.is_empty() && !self.sheets.access_token.is_empty()
            }
            SheetBackendKind::S3 => !self.sheets.s3.bucket.is_empty(),
            SheetBackendKind::Local => !self.sheets.local_path.is_empty(),
            SheetBackendKind::Memory => true,
        }
    }

    pub fn enabled_platforms(&self) -> Vec<&'static str> {
        let mut platforms = Vec::new();
        if self.facebook_enabled() {
            platforms.push("facebook");
        }
        if self.instagram_enabled() {
            platforms.push("instagram");
        }
        if self.twitter_enabled() {
            platforms.push("twitter");
        }
        platforms
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}
