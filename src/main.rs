//! CLI entry point for the request guard server.
//!
//! # Architecture Flow
//!
//! ```text
//! main.rs (Runtime Initialization)
//!     ↓
//! CLI Layer (src/cli.rs)
//!     ↓
//! 1. Config Layer (src/config.rs)               → Load environment variables
//! 2. Observability (src/observability)          → Build the structured log
//! 3. Server (src/api/server.rs)                 → Router + serving loop
//! 4. Interceptors (src/api/middleware)          → Recovery ⊃ RequestLogger ⊃ handlers
//! ```
//!
//! All errors bubble up with context via `GuardResult<T>`.

use eyre::WrapErr;
use request_guard::{cli, observability};

/// Entry point for the request guard server.
///
/// Initializes:
/// - Tokio async runtime (via `#[tokio::main]`)
/// - Structured console logging with tracing (RUST_LOG, LOG_JSON)
///
/// Then delegates to the CLI module.
#[tokio::main]
async fn main() -> eyre::Result<()> {
    let log_level = std::env::var("RUST_LOG").ok();
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    observability::init_tracing(log_level, json_output)
        .wrap_err("failed to initialize tracing")?;

    cli::run().await.wrap_err("request-guard failed")
}
