//! Request logging middleware.
//!
//! Emits exactly one `info` entry per request through the injected
//! [`StructuredLog`](crate::observability::StructuredLog), carrying the final
//! status, request attributes, private handler errors and latency.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::context::RequestContext;
use super::error::HandlerError;
use super::scope::RequestScope;
use crate::observability::{LogEntry, SharedLog};

/// State for [`log_requests`].
#[derive(Clone)]
pub struct RequestLogger {
    log: SharedLog,
    trust_forwarded_headers: bool,
}

impl RequestLogger {
    /// Create a logger writing to `log`. Forwarded headers are trusted.
    #[must_use]
    pub fn new(log: SharedLog) -> Self {
        Self {
            log,
            trust_forwarded_headers: true,
        }
    }

    /// Set whether `X-Forwarded-For` / `X-Real-IP` decide the client IP.
    #[must_use]
    pub const fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }
}

/// Logs every request once it has been answered.
pub async fn log_requests(
    State(logger): State<RequestLogger>,
    mut request: Request,
    next: Next,
) -> Response {
    let scope = RequestScope::of(&mut request);
    let context = RequestContext::capture(&request, logger.trust_forwarded_headers);
    let pending = PendingEntry::start(logger.log, context, scope.clone());

    let response = next.run(request).await;

    if let Some(HandlerError(message)) = response.extensions().get::<HandlerError>() {
        scope.record_error(message);
    }
    scope.set_status(response.status());
    pending.finish();

    response
}

/// Everything about an access entry except the outcome.
pub(crate) struct EntryDraft {
    log: SharedLog,
    context: RequestContext,
    start: Instant,
}

impl EntryDraft {
    pub(crate) fn emit(self, status: u16, errors: String) {
        let cost = self.start.elapsed();
        let ctx = self.context;
        let entry = LogEntry::info(ctx.path())
            .with_int("status", i64::from(status))
            .with_str("method", ctx.method().as_str())
            .with_str("path", ctx.path())
            .with_str("query", ctx.query())
            .with_str("ip", ctx.client_ip())
            .with_str("user-agent", ctx.user_agent())
            .with_str("errors", errors)
            .with_duration("cost", cost);
        self.log.emit(entry);
    }
}

/// Emits its entry exactly once: on [`finish`](Self::finish), or on drop.
///
/// A drop during unwinding parks the draft in the [`RequestScope`] so the
/// recovery boundary can release it once the final status is known. A drop
/// without a panic (the host cancelled the request) emits right away.
struct PendingEntry {
    draft: Option<EntryDraft>,
    scope: RequestScope,
}

impl PendingEntry {
    fn start(log: SharedLog, context: RequestContext, scope: RequestScope) -> Self {
        Self {
            draft: Some(EntryDraft {
                log,
                context,
                start: Instant::now(),
            }),
            scope,
        }
    }

    fn finish(self) {
        drop(self);
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        let Some(draft) = self.draft.take() else {
            return;
        };
        if std::thread::panicking() {
            self.scope.defer(draft);
        } else {
            draft.emit(self.scope.status_code(), self.scope.joined_errors());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{FieldValue, Level, MemoryLog};
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn router(log: &MemoryLog) -> Router {
        let logger = RequestLogger::new(Arc::new(log.clone()));
        Router::new()
            .route("/hello", get(|| async { "hello!" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    StatusCode::ACCEPTED
                }),
            )
            .layer(middleware::from_fn_with_state(logger, log_requests))
    }

    #[tokio::test]
    async fn test_one_entry_per_request() {
        let log = MemoryLog::new();
        let app = router(&log);

        let request = Request::builder()
            .uri("/hello?name=gopher")
            .header("user-agent", "test-agent")
            .body(Body::empty())
            .unwrap_or_default();
        let response = app.oneshot(request).await;
        assert!(response.is_ok());

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.level(), Level::Info);
        assert_eq!(entry.message(), "/hello");
        assert_eq!(entry.field("status"), Some(&FieldValue::Int(200)));
        assert_eq!(entry.field("method").and_then(FieldValue::as_str), Some("GET"));
        assert_eq!(entry.field("query").and_then(FieldValue::as_str), Some("name=gopher"));
        assert_eq!(entry.field("user-agent").and_then(FieldValue::as_str), Some("test-agent"));
        assert_eq!(entry.field("errors").and_then(FieldValue::as_str), Some(""));
    }

    #[tokio::test]
    async fn test_cost_covers_handler_time() {
        let log = MemoryLog::new();
        let request = Request::builder()
            .uri("/slow")
            .body(Body::empty())
            .unwrap_or_default();
        let _ = router(&log).oneshot(request).await;

        let entries = log.entries();
        let cost = entries[0].field("cost").and_then(FieldValue::as_duration);
        assert!(cost.is_some_and(|c| c >= Duration::from_millis(20)));
        assert_eq!(entries[0].field("status"), Some(&FieldValue::Int(202)));
    }

    #[tokio::test]
    async fn test_cancelled_request_still_logged() {
        let log = MemoryLog::new();
        let app = router(&log);
        let request = Request::builder()
            .uri("/slow")
            .body(Body::empty())
            .unwrap_or_default();

        let outcome = tokio::time::timeout(Duration::from_millis(1), app.oneshot(request)).await;
        assert!(outcome.is_err());

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field("status"), Some(&FieldValue::Int(0)));
    }
}
