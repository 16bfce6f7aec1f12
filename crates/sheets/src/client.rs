//! # Sheets v4 Client
//!
//! A `SheetStore` over the Google Sheets v4 REST API. Every call addresses a
//! worksheet by title through an A1 range of the form `'Title'`.

use crate::auth::GoogleAuth;
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sheetsync::providers::sheet::{SheetStore, Worksheet};
use sheetsync::{CellValue, SyncError};
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

// --- Sheets API request and response structures ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    column_count: u32,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

impl From<SheetProperties> for Worksheet {
    fn from(p: SheetProperties) -> Self {
        Worksheet {
            title: p.title,
            sheet_id: p.sheet_id,
            row_count: p.grid_properties.row_count,
            column_count: p.grid_properties.column_count,
        }
    }
}

#[derive(Deserialize, Debug)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize, Debug)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AddSheetReply {
    add_sheet: Option<SheetEntry>,
}

#[derive(Deserialize, Debug)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<AddSheetReply>,
}

#[derive(Deserialize, Debug)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<CellValue>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<CellValue>>,
}

/// Quotes a worksheet title as an A1 range, doubling embedded quotes.
pub fn a1_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Returns the response when its status is 2xx, or a message with the
/// status and body otherwise.
async fn check(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    Err(format!("Sheets API returned {status}: {error_text}"))
}

// --- Client implementation ---

/// A client for one spreadsheet.
#[derive(Clone, Debug)]
pub struct GoogleSheetsClient {
    client: ReqwestClient,
    api_base: String,
    spreadsheet_id: String,
    auth: GoogleAuth,
}

impl GoogleSheetsClient {
    pub fn new(spreadsheet_id: impl Into<String>, auth: GoogleAuth) -> Result<Self, SyncError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            auth,
        })
    }

    /// Points the client at another API host, e.g. a mock server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Builds `{base}/v4/spreadsheets/{last}` or `{base}/v4/spreadsheets/{id}/values/{last}`.
    fn endpoint(&self, values: bool, last: &str) -> Result<Url, SyncError> {
        let mut url = Url::parse(&self.api_base).map_err(|e| {
            SyncError::Config(format!("Invalid Sheets API base URL '{}': {e}", self.api_base))
        })?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SyncError::Config(format!("Sheets API base URL '{}' cannot hold a path", self.api_base))
            })?;
            segments.pop_if_empty().push("v4").push("spreadsheets");
            if values {
                segments.push(&self.spreadsheet_id).push("values");
            }
            segments.push(last);
        }
        Ok(url)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, SyncError> {
        let token = self.auth.bearer().await?;
        Ok(request.bearer_auth(token))
    }

    async fn metadata(&self) -> Result<Vec<Worksheet>, String> {
        let mut url = self
            .endpoint(false, &self.spreadsheet_id)
            .map_err(|e| e.to_string())?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");
        debug!("--> GET {url}");

        let request = self
            .authorized(self.client.get(url))
            .await
            .map_err(|e| e.to_string())?;
        let response = request.send().await.map_err(|e| e.to_string())?;
        let metadata: SpreadsheetMetadata = check(response)
            .await?
            .json()
            .await
            .map_err(|e| format!("Malformed spreadsheet metadata: {e}"))?;
        Ok(metadata
            .sheets
            .into_iter()
            .map(|s| Worksheet::from(s.properties))
            .collect())
    }

    async fn batch_update(&self, requests: serde_json::Value) -> Result<BatchUpdateResponse, String> {
        let url = self
            .endpoint(false, &format!("{}:batchUpdate", self.spreadsheet_id))
            .map_err(|e| e.to_string())?;
        debug!("--> POST {url}");
        let request = self
            .authorized(self.client.post(url).json(&json!({ "requests": requests })))
            .await
            .map_err(|e| e.to_string())?;
        let response = request.send().await.map_err(|e| e.to_string())?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| format!("Malformed batchUpdate response: {e}"))
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsClient {
    async fn worksheet(&self, title: &str) -> Result<Option<Worksheet>, SyncError> {
        let sheets = self
            .metadata()
            .await
            .map_err(|e| SyncError::access(title, e))?;
        Ok(sheets.into_iter().find(|w| w.title == title))
    }

    async fn add_worksheet(
        &self,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<Worksheet, SyncError> {
        info!("Creating worksheet '{title}' ({rows}x{columns}).");
        let response = self
            .batch_update(json!([{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": { "rowCount": rows, "columnCount": columns }
                    }
                }
            }]))
            .await
            .map_err(|e| SyncError::access(title, e))?;

        response
            .replies
            .into_iter()
            .find_map(|r| r.add_sheet)
            .map(|s| Worksheet::from(s.properties))
            .ok_or_else(|| SyncError::access(title, "addSheet reply is missing"))
    }

    async fn read_rows(&self, title: &str) -> Result<Vec<Vec<CellValue>>, SyncError> {
        let mut url = self.endpoint(true, &a1_range(title))?;
        // Numbers come back as numbers; dates entered by hand as their text.
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("dateTimeRenderOption", "FORMATTED_STRING");
        debug!("--> GET {url}");
        let request = self.authorized(self.client.get(url)).await?;
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::access(title, e))?;
        let range: ValueRange = check(response)
            .await
            .map_err(|e| SyncError::access(title, e))?
            .json()
            .await
            .map_err(|e| SyncError::access(title, format!("Malformed value range: {e}")))?;

        Ok(range.values)
    }

    async fn clear(&self, title: &str) -> Result<(), SyncError> {
        let url = self.endpoint(true, &format!("{}:clear", a1_range(title)))?;
        debug!("--> POST {url}");
        let request = self
            .authorized(self.client.post(url).json(&json!({})))
            .await?;
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::write(title, e))?;
        check(response)
            .await
            .map_err(|e| SyncError::write(title, e))?;
        Ok(())
    }

    async fn resize(&self, title: &str, rows: u32, columns: u32) -> Result<(), SyncError> {
        let sheet = self
            .worksheet(title)
            .await
            .map_err(|e| SyncError::write(title, e))?
            .ok_or_else(|| SyncError::write(title, "worksheet not found"))?;

        info!("Resizing worksheet '{title}' to {rows}x{columns}.");
        self.batch_update(json!([{
            "updateSheetProperties": {
                "properties": {
                    "sheetId": sheet.sheet_id,
                    "gridProperties": { "rowCount": rows, "columnCount": columns }
                },
                "fields": "gridProperties(rowCount,columnCount)"
            }
        }]))
        .await
        .map_err(|e| SyncError::write(title, e))?;
        Ok(())
    }

    async fn update(&self, title: &str, grid: Vec<Vec<CellValue>>) -> Result<(), SyncError> {
        let range = format!("{}!A1", a1_range(title));
        let mut url = self.endpoint(true, &range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        debug!("--> PUT {url} ({} rows)", grid.len());

        let body = ValueRangeBody {
            range: &range,
            major_dimension: "ROWS",
            values: grid,
        };
        let request = self.authorized(self.client.put(url).json(&body)).await?;
        let response = request
            .send()
            .await
            .map_err(|e| SyncError::write(title, e))?;
        check(response)
            .await
            .map_err(|e| SyncError::write(title, e))?;
        Ok(())
    }
}
