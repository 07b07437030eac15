//! Shared fixtures for the integration tests.

#![allow(dead_code)]
#![allow(clippy::panic)]

use std::error::Error;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::Poll;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request},
    routing::get,
    Extension, Router,
};
use request_guard::api::middleware::{instrument, Recovery, RequestLogger, RequestScope};
use futures_util::stream;
use request_guard::observability::MemoryLog;

/// Error shaped like a failed socket write, wrapping the OS error.
#[derive(Debug)]
pub struct WriteError {
    source: io::Error,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "write tcp 10.0.0.1:8080->10.0.0.2:51334: {}", self.source)
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Router with well-behaved and panicking routes behind both interceptors.
pub fn app(log: &MemoryLog, include_stack: bool) -> Router {
    let routes = Router::new()
        .route("/hello", get(|| async { "hello!" }))
        .route("/boom", get(|| async { panic!("boom") as () }))
        .route(
            "/broken-pipe",
            get(|| async {
                std::panic::panic_any(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "write: broken pipe",
                )) as ()
            }),
        )
        .route(
            "/reset",
            get(|| async {
                let err: Box<dyn Error + Send + Sync> = Box::new(WriteError {
                    source: io::Error::other("read: Connection Reset By Peer"),
                });
                std::panic::panic_any(err) as ()
            }),
        )
        .route(
            "/stream",
            get(|| async {
                Body::from_stream(stream::poll_fn(
                    |_| -> Poll<Option<Result<Bytes, io::Error>>> { panic!("boom in body") },
                ))
            }),
        )
        .route(
            "/degraded",
            get(|Extension(scope): Extension<RequestScope>| async move {
                scope.record_error("cache unavailable");
                scope.record_error("served stale copy");
                "stale"
            }),
        );

    instrument(
        routes,
        RequestLogger::new(Arc::new(log.clone())),
        Recovery::new(Arc::new(log.clone())).include_stack(include_stack),
    )
}

pub fn get_request(uri: &str) -> Request {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// GET request as the server would see it from `peer`.
pub fn get_from(uri: &str, peer: SocketAddr) -> Request {
    let mut request = get_request(uri);
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}
