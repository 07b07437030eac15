//! Panic recovery middleware.
//!
//! [`recover`] wraps the rest of the chain in a [`Boundary`]. A panic raised
//! while producing the response is classified, reported as one `error`
//! entry, and turned into a response, so the connection task and the server
//! keep running.
//!
//! Per request the boundary goes `Armed → Clean | Faulted → Closed`:
//!
//! - **Clean**: downstream answered; nothing is logged here.
//! - **Faulted, broken connection**: the peer is gone. The error goes into
//!   the request's error list and the response is aborted without a status.
//! - **Faulted, generic**: the chain is abandoned with a bare 500.
//!
//! On a fault the request logger's entry is emitted first, with the status
//! decided here, followed by the fault entry.
//!
//! The boundary stays open while the response body streams. A panic raised
//! from the body is reported the same way, after the access entry has
//! already gone out with the response's status, and ends the body with an
//! error so the connection is closed.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::stream;
use http_body::{Body as HttpBody, Frame, SizeHint};
use tracing::debug;

use super::boundary::{contain, Boundary, Fault};
use super::classify::{classify, describe, FaultKind};
use super::context::RequestHead;
use super::scope::RequestScope;
use crate::observability::{LogEntry, SharedLog};

/// Message of every generic fault entry.
pub const PANIC_MESSAGE: &str = "[Recovery from panic]";

/// Marker extension on responses abandoned because the peer disconnected.
///
/// The response still carries the default `200 OK` head, but it is never
/// written: its body fails on first poll. Layers outside the interceptors
/// should check [`written_status`] rather than [`Response::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseAborted;

/// Status the response will put on the wire, `None` if it was aborted.
#[must_use]
pub fn written_status<B>(response: &Response<B>) -> Option<StatusCode> {
    if response.extensions().get::<ResponseAborted>().is_some() {
        None
    } else {
        Some(response.status())
    }
}

/// State for [`recover`].
#[derive(Clone)]
pub struct Recovery {
    log: SharedLog,
    include_stack: bool,
}

impl Recovery {
    /// Create a recovery interceptor writing to `log`, without stack traces.
    #[must_use]
    pub fn new(log: SharedLog) -> Self {
        super::boundary::install_panic_hook();
        Self {
            log,
            include_stack: false,
        }
    }

    /// Set whether generic fault entries carry a `stack` field.
    #[must_use]
    pub const fn include_stack(mut self, include_stack: bool) -> Self {
        self.include_stack = include_stack;
        self
    }

    fn finalize(record: &FaultRecord, scope: &RequestScope) -> Response {
        match record.kind {
            FaultKind::BrokenConnection => {
                scope.record_error(&record.error);
                aborted_response(&record.error)
            }
            FaultKind::Generic => {
                scope.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    fn report(&self, record: FaultRecord, path: &str) {
        debug!(kind = %record.kind, path, "Recovered from panic");
        let request = String::from_utf8_lossy(&record.request).into_owned();
        let entry = match record.kind {
            FaultKind::BrokenConnection => LogEntry::error(path)
                .with_error("error", &record.error)
                .with_str("request", request),
            FaultKind::Generic => {
                let entry = LogEntry::error(PANIC_MESSAGE)
                    .with_error("error", &record.error)
                    .with_str("request", request);
                match record.stack {
                    Some(stack) if self.include_stack => entry.with_str("stack", stack),
                    _ => entry,
                }
            }
        };
        self.log.emit(entry);
    }
}

/// Diagnostic facts about one caught panic.
struct FaultRecord {
    error: String,
    kind: FaultKind,
    stack: Option<String>,
    request: Vec<u8>,
}

impl FaultRecord {
    fn new(fault: Fault, head: &RequestHead) -> Self {
        let kind = classify(fault.payload.as_ref());
        Self {
            error: describe(fault.payload.as_ref()),
            kind,
            stack: match kind {
                FaultKind::Generic => fault.stack,
                FaultKind::BrokenConnection => None,
            },
            request: head.dump(),
        }
    }
}

/// Contains panics raised by the rest of the chain.
pub async fn recover(
    State(recovery): State<Recovery>,
    mut request: Request,
    next: Next,
) -> Response {
    let scope = RequestScope::of(&mut request);
    let head = RequestHead::capture(&request);
    let path = request.uri().path().to_string();

    let mut boundary = Boundary::new(next.run(request), recovery.include_stack);
    let outcome = (&mut boundary).await;
    match outcome {
        Ok(response) => {
            let watch = BodyWatch {
                recovery,
                head,
                path,
            };
            response.map(|inner| {
                Body::new(GuardedBody {
                    inner,
                    watch: Some(watch),
                })
            })
        }
        Err(fault) => {
            let record = FaultRecord::new(fault, &head);
            let response = Recovery::finalize(&record, &scope);

            // Dropping the poisoned chain runs the logger's pending entry,
            // which now sees the final status.
            drop(boundary);
            scope.release_deferred();

            recovery.report(record, &path);
            response
        }
    }
}

/// What a streaming body needs to report a fault after `recover` returned.
struct BodyWatch {
    recovery: Recovery,
    head: RequestHead,
    path: String,
}

/// Response body polled inside the recovery boundary.
///
/// After a fault the body reports once, yields one error and then ends.
struct GuardedBody {
    inner: Body,
    watch: Option<BodyWatch>,
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let Some(capture_stack) = this.watch.as_ref().map(|w| w.recovery.include_stack) else {
            return Poll::Ready(None);
        };
        let inner = Pin::new(&mut this.inner);

        match contain(capture_stack, || inner.poll_frame(cx)) {
            Ok(polled) => polled,
            Err(fault) => {
                let Some(watch) = this.watch.take() else {
                    return Poll::Ready(None);
                };
                let record = FaultRecord::new(fault, &watch.head);
                let error = std::io::Error::other(record.error.clone());
                watch.recovery.report(record, &watch.path);
                Poll::Ready(Some(Err(axum::Error::new(error))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.watch.is_none() || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Response whose body fails immediately, so the server closes the
/// connection instead of finishing a message nobody will read.
fn aborted_response(reason: &str) -> Response {
    let error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, reason.to_string());
    let body = Body::from_stream(stream::once(async move { Err::<Bytes, _>(error) }));
    let mut response = Response::new(body);
    response.extensions_mut().insert(ResponseAborted);
    response
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::observability::{FieldValue, Level, MemoryLog};
    use axum::{middleware, routing::get, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    type Chunk = Poll<Option<Result<Bytes, std::io::Error>>>;

    fn router(log: &MemoryLog, include_stack: bool) -> Router {
        let recovery = Recovery::new(Arc::new(log.clone())).include_stack(include_stack);
        Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route("/boom", get(|| async { panic!("boom") as () }))
            .route(
                "/pipe",
                get(|| async {
                    std::panic::panic_any(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "write: broken pipe",
                    )) as ()
                }),
            )
            .route(
                "/stream",
                get(|| async {
                    Body::from_stream(stream::poll_fn(|_| -> Chunk { panic!("boom in body") }))
                }),
            )
            .route(
                "/stream-pipe",
                get(|| async {
                    Body::from_stream(stream::poll_fn(|_| -> Chunk {
                        std::panic::panic_any(std::io::Error::new(
                            std::io::ErrorKind::BrokenPipe,
                            "write: broken pipe",
                        ))
                    }))
                }),
            )
            .layer(middleware::from_fn_with_state(recovery, recover))
    }

    fn get_request(uri: &str) -> Request {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_clean_request_logs_nothing() {
        let log = MemoryLog::new();
        let response = router(&log, true).oneshot(get_request("/ok")).await.unwrap();
        assert_eq!(written_status(&response), Some(StatusCode::OK));

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"fine");
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_generic_panic_becomes_500() {
        let log = MemoryLog::new();
        let response = router(&log, true).oneshot(get_request("/boom")).await;
        assert!(response.is_ok_and(|r| r.status() == StatusCode::INTERNAL_SERVER_ERROR));

        let entries = log.at_level(Level::Error);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message(), PANIC_MESSAGE);
        assert_eq!(entries[0].field("error"), Some(&FieldValue::Error("boom".to_string())));
        assert!(entries[0]
            .field("stack")
            .and_then(FieldValue::as_str)
            .is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn test_stack_omitted_when_disabled() {
        let log = MemoryLog::new();
        let _ = router(&log, false).oneshot(get_request("/boom")).await;

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].has_field("stack"));
    }

    #[tokio::test]
    async fn test_broken_pipe_aborts_response() {
        let log = MemoryLog::new();
        let response = router(&log, true).oneshot(get_request("/pipe")).await;
        let Ok(response) = response else {
            panic!("router is infallible");
        };
        assert!(response.extensions().get::<ResponseAborted>().is_some());
        assert_eq!(written_status(&response), None);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        assert!(body.is_err());

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message(), "/pipe");
        assert!(!entries[0].has_field("stack"));
        assert!(entries[0]
            .field("request")
            .and_then(FieldValue::as_str)
            .is_some_and(|r| r.starts_with("GET /pipe HTTP/1.1\r\n")));
    }

    #[tokio::test]
    async fn test_panic_in_body_is_reported() {
        let log = MemoryLog::new();
        let response = router(&log, true).oneshot(get_request("/stream")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        assert!(body.is_err());

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message(), PANIC_MESSAGE);
        assert_eq!(
            entries[0].field("error"),
            Some(&FieldValue::Error("boom in body".to_string()))
        );
        assert!(entries[0].has_field("stack"));
        assert!(entries[0]
            .field("request")
            .and_then(FieldValue::as_str)
            .is_some_and(|r| r.starts_with("GET /stream HTTP/1.1\r\n")));
    }

    #[tokio::test]
    async fn test_broken_pipe_in_body_has_no_stack() {
        let log = MemoryLog::new();
        let response = router(&log, true)
            .oneshot(get_request("/stream-pipe"))
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        assert!(body.is_err());

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message(), "/stream-pipe");
        assert!(!entries[0].has_field("stack"));
    }
}
