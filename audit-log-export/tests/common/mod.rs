#![allow(dead_code)]

use std::{path::Path, sync::Arc, time::Duration};

use audit_log_export::{
    auth::Credentials,
    checkpoint::{CheckpointStore, IniCheckpointStore},
    export::ExportFormat,
    http::build_http_client,
    notify::NoopNotifier,
    run::{Exporter, ExporterBuilder},
};
use httpmock::{Method, MockServer};
use serde_json::{json, Value};

/// A log record the way the management API returns one. The log_id carries the
/// date at offset 3, like the real ids do.
pub fn log_record(day: u32, seq: usize) -> Value {
    json!({
        "log_id": format!("900202403{day:02}{seq:012}"),
        "date": format!("2024-03-{day:02}T10:00:00.000Z"),
        "type": "s",
        "description": "Successful login",
        "client_name": "Dashboard",
        "ip": "203.0.113.7",
        "user_id": format!("auth0|{seq}"),
        "user_name": format!("user{seq}@example.com"),
        "isMobile": false,
        "details": {"prompts": [], "stats": {"loginsCount": seq}}
    })
}

pub fn log_page(day: u32, start: usize, len: usize) -> Value {
    Value::Array((start..start + len).map(|i| log_record(day, i)).collect())
}

pub fn mock_token(server: &MockServer) {
    server.mock(|when, then| {
        when.method(Method::POST).path("/oauth/token");
        then.status(200).json_body(json!({
            "access_token": "integration-token",
            "token_type": "Bearer",
            "expires_in": 86400
        }));
    });
}

pub fn exporter(
    server: &MockServer,
    checkpoint_file: &Path,
    output_dir: &Path,
    format: ExportFormat,
) -> ExporterBuilder {
    let client = build_http_client(Duration::from_secs(5)).unwrap();
    Exporter::builder(
        client,
        server.base_url(),
        Credentials::new("tenant.example.com", "integration-client", "integration-secret"),
        Arc::new(IniCheckpointStore::new(checkpoint_file)),
    )
    .with_notifier(Arc::new(NoopNotifier))
    .with_output_dir(output_dir)
    .with_format(format)
}

pub fn write_checkpoint(path: &Path, log_id: &str) {
    std::fs::write(path, format!("[DEFAULT]\nlast_log_id = {log_id}\n")).unwrap();
}

pub fn read_checkpoint(path: &Path) -> Option<String> {
    IniCheckpointStore::new(path)
        .load()
        .unwrap()
        .map(|cursor| cursor.as_str().to_string())
}
