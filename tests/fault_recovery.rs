//! Integration tests for panic recovery and its interplay with request logging.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use axum::http::StatusCode;
use request_guard::api::middleware::{ResponseAborted, PANIC_MESSAGE};
use request_guard::observability::{FieldValue, Level, LogEntry, MemoryLog};
use tower::ServiceExt;

fn str_field<'a>(entry: &'a LogEntry, name: &str) -> &'a str {
    entry.field(name).and_then(FieldValue::as_str).unwrap()
}

#[tokio::test]
async fn test_generic_panic_answers_500() {
    let log = MemoryLog::new();
    let response = common::app(&log, true)
        .oneshot(common::get_request("/boom"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert!(body.is_empty());

    let faults = log.at_level(Level::Error);
    assert_eq!(faults.len(), 1);
    let fault = &faults[0];
    assert_eq!(fault.message(), PANIC_MESSAGE);
    assert_eq!(fault.field("error"), Some(&FieldValue::Error("boom".to_string())));
    assert!(str_field(fault, "request").starts_with("GET /boom HTTP/1.1\r\n"));
    assert!(!str_field(fault, "stack").is_empty());
}

#[tokio::test]
async fn test_generic_panic_without_stack() {
    let log = MemoryLog::new();
    common::app(&log, false)
        .oneshot(common::get_request("/boom"))
        .await
        .unwrap();

    let faults = log.at_level(Level::Error);
    assert_eq!(faults.len(), 1);
    assert!(faults[0].has_field("error"));
    assert!(faults[0].has_field("request"));
    assert!(!faults[0].has_field("stack"));
}

#[tokio::test]
async fn test_access_entry_precedes_fault_entry() {
    let log = MemoryLog::new();
    common::app(&log, true)
        .oneshot(common::get_request("/boom"))
        .await
        .unwrap();

    let entries = log.entries();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].level(), Level::Info);
    assert_eq!(entries[0].message(), "/boom");
    assert_eq!(entries[0].field("status"), Some(&FieldValue::Int(500)));

    assert_eq!(entries[1].level(), Level::Error);
    assert_eq!(entries[1].message(), PANIC_MESSAGE);
}

#[tokio::test]
async fn test_broken_pipe_is_not_answered() {
    let log = MemoryLog::new();
    let response = common::app(&log, true)
        .oneshot(common::get_request("/broken-pipe"))
        .await
        .unwrap();
    assert!(response.extensions().get::<ResponseAborted>().is_some());
    assert!(axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .is_err());

    let entries = log.entries();
    assert_eq!(entries.len(), 2);

    let access = &entries[0];
    assert_eq!(access.level(), Level::Info);
    assert_eq!(access.field("status"), Some(&FieldValue::Int(0)));
    assert!(str_field(access, "errors").contains("broken pipe"));

    let fault = &entries[1];
    assert_eq!(fault.level(), Level::Error);
    assert_eq!(fault.message(), "/broken-pipe");
    assert!(!fault.has_field("stack"), "broken connections never carry a stack");
    assert!(str_field(fault, "request").starts_with("GET /broken-pipe HTTP/1.1\r\n"));
}

#[tokio::test]
async fn test_panic_while_streaming_body_is_reported() {
    let log = MemoryLog::new();
    let response = common::app(&log, true)
        .oneshot(common::get_request("/stream"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .is_err());

    let entries = log.entries();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].level(), Level::Info);
    assert_eq!(entries[0].message(), "/stream");
    assert_eq!(entries[0].field("status"), Some(&FieldValue::Int(200)));

    let fault = &entries[1];
    assert_eq!(fault.level(), Level::Error);
    assert_eq!(fault.message(), PANIC_MESSAGE);
    assert_eq!(str_field(fault, "error"), "boom in body");
    assert!(!str_field(fault, "stack").is_empty());
    assert!(str_field(fault, "request").starts_with("GET /stream HTTP/1.1\r\n"));
}

#[tokio::test]
async fn test_wrapped_connection_reset_is_broken_connection() {
    let log = MemoryLog::new();
    let response = common::app(&log, true)
        .oneshot(common::get_request("/reset"))
        .await
        .unwrap();
    assert!(response.extensions().get::<ResponseAborted>().is_some());

    let faults = log.at_level(Level::Error);
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].message(), "/reset");
    assert!(!faults[0].has_field("stack"));
    assert!(str_field(&faults[0], "error").starts_with("write tcp"));
}

#[tokio::test]
async fn test_server_keeps_serving_after_panic() {
    let log = MemoryLog::new();
    let app = common::app(&log, false);

    let first = app.clone().oneshot(common::get_request("/boom")).await.unwrap();
    assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let second = app.oneshot(common::get_request("/hello")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);

    assert_eq!(log.count(|e| e.level() == Level::Info), 2);
    assert_eq!(log.count(|e| e.level() == Level::Error), 1);
}
