//! # Google Sheets Client Integration Tests
//!
//! Drives `GoogleSheetsClient` against an `httpmock` server standing in for
//! both the Sheets v4 API and the OAuth token endpoint.

use anyhow::Result;
use httpmock::{Method, MockServer};
use serde_json::json;
use sheetsync::pipeline::{write_record_set, SheetCapacity};
use sheetsync::providers::sheet::SheetStore;
use sheetsync::{Record, RecordSet, SyncError, Value};
use sheetsync_sheets::{parse_service_account_key, GoogleAuth, GoogleSheetsClient};
use sheetsync_test_utils::setup_tracing;

const SHEET_ID: &str = "abc123";
const METADATA_PATH: &str = "/v4/spreadsheets/abc123";
const BATCH_PATH: &str = "/v4/spreadsheets/abc123:batchUpdate";

fn static_client(server: &MockServer) -> GoogleSheetsClient {
    GoogleSheetsClient::new(SHEET_ID, GoogleAuth::Static("test-token".into()))
        .unwrap()
        .with_api_base(server.base_url())
}

/// Loads the fixture key and points its `token_uri` at the mock server.
fn service_account_client(server: &MockServer) -> Result<GoogleSheetsClient> {
    let raw = include_str!("fixtures/service_account.json");
    let mut key = parse_service_account_key(raw)?;
    key.token_uri = server.url("/token");
    Ok(
        GoogleSheetsClient::new(SHEET_ID, GoogleAuth::service_account(key))?
            .with_api_base(server.base_url()),
    )
}

fn sheet(id: i64, title: &str, rows: u32, cols: u32) -> serde_json::Value {
    json!({
        "properties": {
            "sheetId": id,
            "title": title,
            "index": 0,
            "sheetType": "GRID",
            "gridProperties": { "rowCount": rows, "columnCount": cols }
        }
    })
}

#[tokio::test]
async fn test_worksheet_lookup_by_title() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let metadata = server
        .mock_async(|when, then| {
            when.method(Method::GET)
                .path(METADATA_PATH)
                .query_param("fields", "sheets.properties")
                .header("authorization", "Bearer test-token");
            then.status(200).json_body(json!({
                "sheets": [sheet(0, "Hoja 1", 1000, 26), sheet(42, "Ingreso", 100, 20)]
            }));
        })
        .await;

    let client = static_client(&server);
    let found = client.worksheet("Ingreso").await?.expect("Ingreso exists");
    assert_eq!(found.sheet_id, 42);
    assert_eq!((found.row_count, found.column_count), (100, 20));
    assert!(client.worksheet("Inventario").await?.is_none());

    metadata.assert_hits_async(2).await;
    Ok(())
}

#[tokio::test]
async fn test_write_creates_clears_and_writes() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let metadata = server
        .mock_async(|when, then| {
            when.method(Method::GET).path(METADATA_PATH);
            then.status(200).json_body(json!({ "sheets": [] }));
        })
        .await;
    let add = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path(BATCH_PATH)
                .body_contains("addSheet")
                .body_contains("\"rowCount\":100")
                .body_contains("\"columnCount\":20");
            then.status(200).json_body(json!({
                "spreadsheetId": SHEET_ID,
                "replies": [{ "addSheet": sheet(7, "Inventario", 100, 20) }]
            }));
        })
        .await;
    let clear = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path_contains("/values/")
                .path_contains("Inventario")
                .path_contains(":clear");
            then.status(200)
                .json_body(json!({ "spreadsheetId": SHEET_ID, "clearedRange": "Inventario" }));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(Method::PUT)
                .path_contains("/values/")
                .path_contains("Inventario")
                .query_param("valueInputOption", "RAW")
                .json_body_partial(
                    json!({
                        "majorDimension": "ROWS",
                        "values": [["producto", "stock"], ["Arroz", 12], ["Frijol", ""]]
                    })
                    .to_string(),
                );
            then.status(200).json_body(json!({ "updatedRows": 3 }));
        })
        .await;

    let records = RecordSet::new(
        vec!["producto".into(), "stock".into()],
        vec![
            Record::new(vec!["Arroz".into(), Value::Int(12)]),
            Record::new(vec!["Frijol".into(), Value::Null]),
        ],
    )?;
    let client = static_client(&server);
    let written =
        write_record_set(&client, "Inventario", &records, SheetCapacity::default()).await?;

    assert_eq!(written, 2);
    metadata.assert_async().await;
    add.assert_async().await;
    clear.assert_async().await;
    update.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_resize_targets_sheet_id() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path(METADATA_PATH);
            then.status(200)
                .json_body(json!({ "sheets": [sheet(42, "Ingreso", 100, 20)] }));
        })
        .await;
    let resize = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path(BATCH_PATH)
                .body_contains("updateSheetProperties")
                .body_contains("\"sheetId\":42")
                .body_contains("\"rowCount\":251");
            then.status(200)
                .json_body(json!({ "spreadsheetId": SHEET_ID, "replies": [{}] }));
        })
        .await;

    static_client(&server).resize("Ingreso", 251, 20).await?;
    resize.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_read_rows_keeps_unformatted_values() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let read = server
        .mock_async(|when, then| {
            when.method(Method::GET)
                .path_contains("/values/")
                .path_contains("Ingreso")
                .query_param("valueRenderOption", "UNFORMATTED_VALUE")
                .query_param("dateTimeRenderOption", "FORMATTED_STRING");
            then.status(200).json_body(json!({
                "range": "Ingreso!A1:Z1000",
                "majorDimension": "ROWS",
                "values": [
                    ["Fecha", "monto", "pagado"],
                    ["2026-01-29 08:00:00", 7.5, true],
                    ["2026-01-30 08:00:00"]
                ]
            }));
        })
        .await;

    let rows = static_client(&server).read_rows("Ingreso").await?;
    read.assert_async().await;
    assert_eq!(
        rows,
        vec![
            vec![json!("Fecha"), json!("monto"), json!("pagado")],
            vec![json!("2026-01-29 08:00:00"), json!(7.5), json!(true)],
            vec![json!("2026-01-30 08:00:00")],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_range_reads_as_no_rows() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path_contains("/values/");
            then.status(200)
                .json_body(json!({ "range": "Vacia!A1:Z1000", "majorDimension": "ROWS" }));
        })
        .await;

    assert!(static_client(&server).read_rows("Vacia").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_http_errors_map_to_access_and_write_failures() {
    setup_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path(METADATA_PATH);
            then.status(403)
                .body(r#"{"error": {"code": 403, "status": "PERMISSION_DENIED"}}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path_contains(":clear");
            then.status(500).body("backend error");
        })
        .await;

    let client = static_client(&server);
    match client.worksheet("Ingreso").await {
        Err(SyncError::SheetAccessFailed { sheet, message }) => {
            assert_eq!(sheet, "Ingreso");
            assert!(message.contains("403"), "got: {message}");
            assert!(message.contains("PERMISSION_DENIED"));
        }
        other => panic!("expected SheetAccessFailed, got {other:?}"),
    }
    match client.clear("Ingreso").await {
        Err(SyncError::WriteFailed { message, .. }) => assert!(message.contains("500")),
        other => panic!("expected WriteFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_service_account_token_is_exchanged_once_and_cached() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path("/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body_contains(
                    "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
                )
                .body_contains("assertion=");
            then.status(200).json_body(json!({
                "access_token": "ya29.sheetsync",
                "expires_in": 3599,
                "token_type": "Bearer"
            }));
        })
        .await;
    let metadata = server
        .mock_async(|when, then| {
            when.method(Method::GET)
                .path(METADATA_PATH)
                .header("authorization", "Bearer ya29.sheetsync");
            then.status(200).json_body(json!({ "sheets": [] }));
        })
        .await;

    let client = service_account_client(&server)?;
    client.worksheet("Ingreso").await?;
    client.worksheet("Inventario").await?;

    token.assert_hits_async(1).await;
    metadata.assert_hits_async(2).await;
    Ok(())
}

#[tokio::test]
async fn test_token_near_expiry_is_refreshed() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let token = server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/token");
            then.status(200)
                .json_body(json!({
                    "access_token": "short-lived",
                    "expires_in": 30,
                    "token_type": "Bearer"
                }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(Method::GET).path(METADATA_PATH);
            then.status(200).json_body(json!({ "sheets": [] }));
        })
        .await;

    let client = service_account_client(&server)?;
    client.worksheet("Ingreso").await?;
    client.worksheet("Ingreso").await?;

    token.assert_hits_async(2).await;
    Ok(())
}

#[tokio::test]
async fn test_rejected_credentials_fail_as_auth_error() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/token");
            then.status(400)
                .json_body(json!({ "error": "invalid_grant", "error_description": "Invalid JWT" }));
        })
        .await;
    let metadata = server
        .mock_async(|when, then| {
            when.method(Method::GET).path(METADATA_PATH);
            then.status(200).json_body(json!({ "sheets": [] }));
        })
        .await;

    let err = service_account_client(&server)?
        .read_rows("Ingreso")
        .await
        .unwrap_err();
    assert!(matches!(&err, SyncError::Auth(_)), "unexpected error: {err}");
    metadata.assert_hits_async(0).await;
    Ok(())
}
