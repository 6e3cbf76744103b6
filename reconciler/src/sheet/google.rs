use super::{CellValue, SheetBackend, HEADERS};
use async_trait::async_trait;
use common::config::{HttpConfig, SheetsConfig};
use common::{Error, Result};
use rquest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: [Vec<CellValue>; 1],
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_range: Option<String>,
}

/// Google Sheets REST v4 over a bearer access token.
pub struct GoogleSheetsBackend {
    client: rquest::Client,
    api_url: String,
    sheet_id: String,
    sheet_name: String,
    access_token: String,
}

impl GoogleSheetsBackend {
    pub fn new(config: &SheetsConfig, http: &HttpConfig) -> Result<Self> {
        if config.sheet_id.is_empty() {
            return Err(Error::InvalidInput("sheets.sheet_id is not configured".into()));
        }
        if config.access_token.is_empty() {
            return Err(Error::InvalidInput(
                "sheets.access_token is not configured".into(),
            ));
        }

        let client = rquest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            sheet_id: config.sheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// `'Sheet Name'!A1:M1` style range on the configured tab.
    fn range(&self, cells: &str) -> String {
        format!("'{}'!{}", self.sheet_name.replace('\'', "''"), cells)
    }

    fn values_url(&self, range: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidInput(format!("Cannot use {} as a base URL", self.api_url)))?
            .pop_if_empty()
            .extend(["spreadsheets", self.sheet_id.as_str(), "values", range]);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(&self, request: rquest::RequestBuilder) -> Result<String> {
        let response = request.bearer_auth(&self.access_token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!(status = status.as_u16(), sheet_id = %self.sheet_id, "Sheets request failed");
            return Err(Error::from_status(status.as_u16(), &body));
        }
        Ok(body)
    }
}

/// Column letter for a 0-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Row number of the first cell in an A1 range such as `Sheet1!A17:M17`.
pub fn first_row_of_range(range: &str) -> Option<usize> {
    let cells = range.rsplit('!').next()?;
    let first = cells.split(':').next()?;
    let digits: String = first
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic() || *c == '$')
        .filter(|c| *c != '$')
        .collect();
    digits.parse().ok()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetBackend for GoogleSheetsBackend {
    async fn read_values(&self) -> Result<Vec<Vec<String>>> {
        let last_col = column_letter(HEADERS.len() - 1);
        let range = self.range(&format!("A:{}", last_col));
        let url = self.values_url(&range, &[])?;

        let body = self.send(self.client.get(url.as_str())).await?;
        let parsed: ValueRange = serde_json::from_str(&body)?;

        Ok(parsed
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn write_range(&self, row: usize, start_col: usize, values: Vec<CellValue>) -> Result<()> {
        if row == 0 || values.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Invalid write at row {} with {} cells",
                row,
                values.len()
            )));
        }

        let end_col = start_col + values.len() - 1;
        let range = self.range(&format!(
            "{}{}:{}{}",
            column_letter(start_col),
            row,
            column_letter(end_col),
            row
        ));
        let url = self.values_url(&range, &[("valueInputOption", "RAW")])?;
        let body = serde_json::to_vec(&ValueRangeBody {
            range: &range,
            major_dimension: "ROWS",
            values: [values],
        })?;

        self.send(
            self.client
                .put(url.as_str())
                .header(CONTENT_TYPE, "application/json")
                .body(body),
        )
        .await?;
        Ok(())
    }

    async fn append_row(&self, values: Vec<CellValue>) -> Result<usize> {
        let last_col = column_letter(HEADERS.len() - 1);
        let range = self.range(&format!("A:{}", last_col));
        let url = self.values_url(
            &format!("{}:append", range),
            &[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ],
        )?;
        let body = serde_json::to_vec(&ValueRangeBody {
            range: &range,
            major_dimension: "ROWS",
            values: [values],
        })?;

        let response = self
            .send(
                self.client
                    .post(url.as_str())
                    .header(CONTENT_TYPE, "application/json")
                    .body(body),
            )
            .await?;

        let parsed: AppendResponse = serde_json::from_str(&response)?;
        let row = parsed
            .updates
            .and_then(|u| u.updated_range)
            .as_deref()
            .and_then(first_row_of_range);

        match row {
            Some(row) => Ok(row),
            None => {
                warn!(sheet_id = %self.sheet_id, "Append response had no updatedRange, re-reading");
                Ok(self.read_values().await?.len())
            }
        }
    }

    fn describe(&self) -> String {
        format!("google-sheets:{}/{}", self.sheet_id, self.sheet_name)
    }
}
