//! # Request Guard
//!
//! Structured request logging and panic recovery for [axum](https://github.com/tokio-rs/axum)
//! services.
//!
//! Two interceptors wrap every request:
//!
//! - **Request logger** ([`api::middleware::log_requests`]) emits one `info`
//!   entry per request with status, method, path, query, client IP,
//!   user-agent, private handler errors and latency.
//! - **Recovery** ([`api::middleware::recover`]) contains panics raised while
//!   producing the response. Broken connections are logged without a stack
//!   and the response is abandoned; any other panic is logged (optionally
//!   with a stack trace) and answered with a 500.
//!
//! Both write through a [`observability::StructuredLog`] built once at
//! startup and injected at construction.
//!
//! ## Architecture
//!
//! 1. **Config Layer** ([`config`]) - Environment variable loading
//! 2. **Observability** ([`observability`]) - Tracing setup and structured log sinks
//! 3. **Interceptors** ([`api::middleware`]) - Request logging and panic recovery
//! 4. **Server** ([`api::server`]) - Routing, timeouts and graceful shutdown
//!
//! ## Quick Start
//!
//! ```bash
//! cargo run --release -- serve --port 8080
//! curl localhost:8080/hello
//! ```
//!
//! ### Using as a Library
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{routing::get, Router};
//! use request_guard::api::middleware::{instrument, Recovery, RequestLogger};
//! use request_guard::config::LogRotation;
//! use request_guard::observability::{JsonLog, Level, SharedLog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log: SharedLog = Arc::new(JsonLog::rolling(
//!         "./logs/access.log".as_ref(),
//!         LogRotation::Daily,
//!         5,
//!         Level::Debug,
//!     )?);
//!
//!     let app = instrument(
//!         Router::new().route("/hello", get(|| async { "hello!" })),
//!         RequestLogger::new(log.clone()),
//!         Recovery::new(log.clone()).include_stack(true),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     log.flush();
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Setup and serving failures return [`error::GuardResult<T>`](error::GuardResult).
//! Panics inside handlers never do: they end at the recovery boundary.
//!
//! ## Testing
//!
//! ```bash
//! # All tests
//! cargo test
//!
//! # Unit tests only
//! cargo test --lib
//!
//! # Integration tests
//! cargo test --test '*'
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! - MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//! - Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!
//! at your option.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
