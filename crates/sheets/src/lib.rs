//! # `sheetsync-sheets`: Google Sheets Destination
//!
//! This crate provides the Google Sheets side of `sheetsync`: a `SheetStore`
//! implementation over the Sheets v4 REST API and the service-account
//! authentication it needs.

pub mod auth;
pub mod client;

pub use auth::{
    parse_service_account_key, GoogleAuth, ServiceAccountAuth, ServiceAccountKey, DEFAULT_SCOPES,
};
pub use client::{GoogleSheetsClient, DEFAULT_API_BASE};

use regex::Regex;
use sheetsync::SyncError;

/// Extracts the spreadsheet ID from a bare ID or a Google Sheets URL.
///
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=0` and `<id>` both
/// yield `<id>`.
pub fn spreadsheet_id(input: &str) -> Result<String, SyncError> {
    let input = input.trim();
    if input.contains("/spreadsheets/d/") {
        let re = Regex::new(r"/spreadsheets/d/([a-zA-Z0-9-_]+)")?;
        let caps = re.captures(input).ok_or_else(|| {
            SyncError::Config(format!("Could not find spreadsheet ID in URL '{input}'."))
        })?;
        return caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| SyncError::Config("Spreadsheet ID capture group is missing.".into()));
    }

    let bare = Regex::new(r"^[a-zA-Z0-9-_]+$")?;
    if bare.is_match(input) {
        Ok(input.to_string())
    } else {
        Err(SyncError::Config(format!(
            "'{input}' is neither a spreadsheet ID nor a Google Sheets URL."
        )))
    }
}
