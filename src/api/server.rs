//! Axum server setup and routing.

use axum::{response::Response, routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info, warn, Span};

use crate::api::handlers;
use crate::api::middleware::{instrument, written_status, Recovery, RequestLogger};
use crate::app_state::AppState;
use crate::config::Config;
use crate::error::{GuardError, GuardResult};
use crate::observability::SharedLog;

/// Build the application router with both interceptors installed.
///
/// The request timeout and tracing span sit outside the interceptors, so a
/// timed-out request still closes its recovery boundary and gets logged.
pub fn build_router(state: AppState, log: SharedLog, config: &Config) -> Router {
    let routes = Router::new()
        .route("/hello", get(handlers::hello::hello))
        .route("/health", get(handlers::health::health_check))
        .fallback(handlers::hello::not_found)
        .with_state(state);

    let logger = RequestLogger::new(log.clone())
        .trust_forwarded_headers(config.trust_forwarded_headers());
    let recovery = Recovery::new(log).include_stack(config.include_stack());
    let app = instrument(routes, logger, recovery);

    let app = match config.request_timeout() {
        Some(timeout) => app.layer(TimeoutLayer::new(timeout)),
        None => app,
    };

    app.layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http().on_response(trace_response)),
    )
}

fn trace_response(response: &Response, latency: Duration, _span: &Span) {
    match written_status(response) {
        Some(status) => {
            debug!(status = status.as_u16(), ?latency, "finished processing request");
        }
        None => debug!(?latency, "response aborted, peer disconnected"),
    }
}

/// Run the server until `shutdown` resolves.
///
/// Returns once in-flight requests have drained. The caller is expected to
/// flush the structured log afterwards.
///
/// # Errors
///
/// Returns [`GuardError::ServerError`] if the address cannot be bound or the
/// accept loop fails.
pub async fn run_server<F>(
    config: &Config,
    state: AppState,
    log: SharedLog,
    shutdown: F,
) -> GuardResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state, log, config);
    let addr = config.socket_addr();

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        GuardError::server(format!("failed to bind {addr}"), Some(Box::new(e)))
    })?;

    info!(
        addr = %addr,
        include_stack = config.include_stack(),
        request_timeout_secs = config.request_timeout().map(|t| t.as_secs()),
        "Starting API server"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| GuardError::server("server terminated unexpectedly", Some(Box::new(e))))?;

    info!("API server stopped accepting requests");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM, marking `state` as draining.
pub async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    state.begin_draining();
    info!("Shutdown signal received, draining in-flight requests");
}
