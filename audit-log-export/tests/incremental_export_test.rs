//! End to end runs against a mocked management API, with the checkpoint in a
//! real INI file and the export read back from disk.

mod common;

use std::fs;

use audit_log_export::{error::RunError, export::ExportFormat, run::RunSummary};
use calamine::{open_workbook, Data, Reader, Xlsx};
use common::*;
use httpmock::{Method, MockServer};
use serde_json::json;
use tempfile::TempDir;

fn sheet_rows(summary: &RunSummary) -> Vec<Vec<Data>> {
    let mut workbook: Xlsx<_> = open_workbook(&summary.output).unwrap();
    let range = workbook.worksheet_range("Sheet1").unwrap();
    range.rows().map(|row| row.to_vec()).collect()
}

#[tokio::test]
async fn test_resumes_from_checkpoint_and_advances_it() {
    let server = MockServer::start();
    mock_token(&server);
    let page = log_page(5, 0, 100);
    let first_id = page[0]["log_id"].as_str().unwrap().to_string();
    let last_id = page[99]["log_id"].as_str().unwrap().to_string();

    let first = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", "abc")
            .query_param("take", "100")
            .header("Authorization", "Bearer integration-token");
        then.status(200).json_body(page.clone());
    });
    let second = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", last_id.as_str());
        then.status(200).json_body(json!([]));
    });

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("last_log_id.ini");
    let output = dir.path().join("output");
    write_checkpoint(&checkpoint, "abc");

    let summary = exporter(&server, &checkpoint, &output, ExportFormat::Xlsx)
        .build()
        .run()
        .await
        .unwrap();

    first.assert();
    second.assert();
    assert_eq!(summary.records, 100);
    assert_eq!(read_checkpoint(&checkpoint), Some(last_id.clone()));
    assert_eq!(
        summary.output,
        output.join(format!("Logs_{}-{}.xlsx", &first_id[3..11], &last_id[3..11]))
    );
    assert_eq!(summary.output, output.join("Logs_20240305-20240305.xlsx"));

    let rows = sheet_rows(&summary);
    assert_eq!(rows.len(), 101);
    assert_eq!(rows[0][0], Data::String("date".to_string()));
    assert_eq!(rows[0][13], Data::String("log_id".to_string()));
    // API order is kept
    assert_eq!(rows[1][13], Data::String(first_id));
    assert_eq!(rows[100][13], Data::String(last_id));
    assert_eq!(rows[1][15], Data::Bool(false));
    // Nested values are flattened to JSON text
    match &rows[1][8] {
        Data::String(details) => assert!(details.contains("loginsCount")),
        other => panic!("unexpected details cell: {other:?}"),
    }
}

#[tokio::test]
async fn test_first_run_starts_from_configured_log_id() {
    let server = MockServer::start();
    mock_token(&server);
    let page = log_page(7, 0, 3);
    let logs = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", "start0");
        then.status(200).json_body(page.clone());
    });

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("state").join("last_log_id.ini");
    let output = dir.path().join("output");

    let summary = exporter(&server, &checkpoint, &output, ExportFormat::Xlsx)
        .with_resolver(std::sync::Arc::new(
            audit_log_export::checkpoint::resolver::FixedCursor::new("start0"),
        ))
        .build()
        .run()
        .await
        .unwrap();

    logs.assert_hits(1);
    assert_eq!(summary.pages, 1);
    assert_eq!(
        read_checkpoint(&checkpoint).as_deref(),
        page[2]["log_id"].as_str()
    );
    assert_eq!(sheet_rows(&summary).len(), 4);
}

#[tokio::test]
async fn test_nothing_new_leaves_checkpoint_untouched() {
    let server = MockServer::start();
    mock_token(&server);
    server.mock(|when, then| {
        when.method(Method::GET).path("/api/v2/logs");
        then.status(200).json_body(json!([]));
    });

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("last_log_id.ini");
    let output = dir.path().join("output");
    write_checkpoint(&checkpoint, "abc");
    let before = fs::read_to_string(&checkpoint).unwrap();

    let summary = exporter(&server, &checkpoint, &output, ExportFormat::Xlsx)
        .build()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.checkpoint, None);
    assert_eq!(fs::read_to_string(&checkpoint).unwrap(), before);
    assert_eq!(summary.output, output.join("Logs_empty.xlsx"));
    // Header only
    assert_eq!(sheet_rows(&summary).len(), 1);
}

#[tokio::test]
async fn test_second_run_continues_where_first_stopped() {
    let server = MockServer::start();
    mock_token(&server);
    let page = log_page(9, 0, 2);
    let last_id = page[1]["log_id"].as_str().unwrap().to_string();
    server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", "abc");
        then.status(200).json_body(page.clone());
    });
    let resumed = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", last_id.as_str());
        then.status(200).json_body(json!([]));
    });

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("last_log_id.ini");
    let output = dir.path().join("output");
    write_checkpoint(&checkpoint, "abc");

    let first = exporter(&server, &checkpoint, &output, ExportFormat::Csv)
        .build()
        .run()
        .await
        .unwrap();
    assert_eq!(first.records, 2);

    let second = exporter(&server, &checkpoint, &output, ExportFormat::Csv)
        .build()
        .run()
        .await
        .unwrap();
    resumed.assert();
    assert_eq!(second.records, 0);
    assert_eq!(read_checkpoint(&checkpoint), Some(last_id));
}

#[tokio::test]
async fn test_rerun_of_same_range_rewrites_identical_workbook() {
    let server = MockServer::start();
    mock_token(&server);
    let page = log_page(10, 0, 3);
    let last_id = page[2]["log_id"].as_str().unwrap().to_string();
    let batch = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", "abc");
        then.status(200).json_body(page.clone());
    });
    server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", last_id.as_str());
        then.status(200).json_body(json!([]));
    });

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("last_log_id.ini");
    let output = dir.path().join("output");

    write_checkpoint(&checkpoint, "abc");
    let first = exporter(&server, &checkpoint, &output, ExportFormat::Xlsx)
        .build()
        .run()
        .await
        .unwrap();
    let first_rows = sheet_rows(&first);

    // Rewinding the checkpoint replays the same logs into the same file
    write_checkpoint(&checkpoint, "abc");
    let second = exporter(&server, &checkpoint, &output, ExportFormat::Xlsx)
        .build()
        .run()
        .await
        .unwrap();

    batch.assert_hits(2);
    assert_eq!(second.output, first.output);
    assert_eq!(fs::read_dir(&output).unwrap().count(), 1);
    assert_eq!(first_rows.len(), 4);
    assert_eq!(sheet_rows(&second), first_rows);
    assert_eq!(read_checkpoint(&checkpoint), Some(last_id));
}

#[tokio::test]
async fn test_rejected_credentials_change_nothing() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(Method::POST).path("/oauth/token");
        then.status(401).json_body(json!({
            "error": "access_denied",
            "error_description": "Unauthorized"
        }));
    });

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("last_log_id.ini");
    let output = dir.path().join("output");
    write_checkpoint(&checkpoint, "abc");

    let err = exporter(&server, &checkpoint, &output, ExportFormat::Xlsx)
        .build()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Auth(_)));
    assert_eq!(read_checkpoint(&checkpoint).as_deref(), Some("abc"));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_page_cap_commits_progress_so_far() {
    let server = MockServer::start();
    mock_token(&server);
    let page = log_page(11, 0, 100);
    let last_id = page[99]["log_id"].as_str().unwrap().to_string();
    server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", "abc");
        then.status(200).json_body(page.clone());
    });
    let beyond_cap = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/v2/logs")
            .query_param("from", last_id.as_str());
        then.status(200).json_body(json!([]));
    });

    let dir = TempDir::new().unwrap();
    let checkpoint = dir.path().join("last_log_id.ini");
    let output = dir.path().join("output");
    write_checkpoint(&checkpoint, "abc");

    let summary = exporter(&server, &checkpoint, &output, ExportFormat::Csv)
        .with_fetch_options(audit_log_export::source::fetcher::FetchOptions {
            max_pages: Some(1),
            ..Default::default()
        })
        .build()
        .run()
        .await
        .unwrap();

    assert!(summary.truncated);
    assert_eq!(beyond_cap.hits(), 0);
    assert_eq!(read_checkpoint(&checkpoint), Some(last_id));
}
