//! Request-boundary interceptors.
//!
//! [`instrument`] layers the two interceptors onto a router in the order they
//! rely on: [`recover`] outermost, then [`log_requests`], then the routes.

mod boundary;
pub mod classify;
mod context;
pub mod error;
pub mod logging;
pub mod recovery;
mod scope;

pub use boundary::{install_panic_hook, Boundary, Fault};
pub use classify::FaultKind;
pub use context::{RequestContext, RequestHead};
pub use error::{ApiError, HandlerError};
pub use logging::{log_requests, RequestLogger};
pub use recovery::{recover, written_status, Recovery, ResponseAborted, PANIC_MESSAGE};
pub use scope::RequestScope;

use axum::{middleware::from_fn_with_state, Router};

/// Wrap every route of `router` with request logging and panic recovery.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use axum::{routing::get, Router};
/// use request_guard::api::middleware::{instrument, Recovery, RequestLogger};
/// use request_guard::observability::{Level, SharedLog, TracingLog};
///
/// let log: SharedLog = Arc::new(TracingLog::new(Level::Info));
/// let app: Router = instrument(
///     Router::new().route("/hello", get(|| async { "hello!" })),
///     RequestLogger::new(log.clone()),
///     Recovery::new(log).include_stack(true),
/// );
/// ```
pub fn instrument<S>(router: Router<S>, logger: RequestLogger, recovery: Recovery) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(from_fn_with_state(logger, log_requests))
        .layer(from_fn_with_state(recovery, recover))
}
