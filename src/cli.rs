//! Command-line interface for the request guard server.
//!
//! # Commands
//!
//! - `serve`: Run the instrumented HTTP server
//! - `config`: Print the effective configuration
//!
//! # Example
//!
//! ```bash
//! # Serve on port 9000 without stack traces
//! request-guard serve --port 9000 --include-stack false
//!
//! # Show what the environment resolves to
//! request-guard config
//! ```

use std::future::Future;

use crate::api::server::{run_server, shutdown_signal};
use crate::app_state::AppState;
use crate::config::Config;
use crate::error::GuardResult;
use crate::observability::{build_structured_log, SharedLog};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{error, info};

/// Structured request logging and panic recovery for HTTP services
#[derive(Parser, Debug)]
#[command(name = "request-guard")]
#[command(about = "HTTP server with structured request logging and panic recovery", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Attach stack traces to recovered panics (overrides INCLUDE_STACK)
        #[arg(long)]
        include_stack: Option<bool>,
    },

    /// Print the effective configuration
    Config,
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - The structured log cannot be opened
/// - The server cannot bind or fails while serving
pub async fn run() -> GuardResult<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve {
            port,
            include_stack,
        } => {
            let config = apply_overrides(config, port, include_stack);
            run_serve_command(config).await
        }
        Commands::Config => {
            print_config(&config);
            Ok(())
        }
    }
}

fn apply_overrides(config: Config, port: Option<u16>, include_stack: Option<bool>) -> Config {
    let config = match port {
        Some(port) => config.with_port(port),
        None => config,
    };
    match include_stack {
        Some(include_stack) => config.with_include_stack(include_stack),
        None => config,
    }
}

/// Execute the serve command.
async fn run_serve_command(config: Config) -> GuardResult<()> {
    let log = build_structured_log(config.log())?;
    let state = AppState::new(config.include_stack());
    let shutdown = shutdown_signal(state.clone());

    serve_then_flush(&config, state, log, shutdown).await
}

/// Serve until `shutdown` resolves, then flush `log` whatever the outcome.
async fn serve_then_flush<F>(
    config: &Config,
    state: AppState,
    log: SharedLog,
    shutdown: F,
) -> GuardResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let result = run_server(config, state, log.clone(), shutdown).await;
    if let Err(e) = &result {
        error!(error = %e, "Server exited with error");
    }

    // Nothing is accepted any more; make buffered entries durable.
    log.flush();
    info!("Structured log flushed");

    result
}

fn print_config(config: &Config) {
    let on_off = |flag: bool| if flag { "on".green() } else { "off".yellow() };

    println!("{}", "request-guard configuration".bold());
    println!("  {:<24} {}", "listen", config.socket_addr().to_string().cyan());
    println!("  {:<24} {}", "include stack", on_off(config.include_stack()));
    println!(
        "  {:<24} {}",
        "trust forwarded headers",
        on_off(config.trust_forwarded_headers())
    );
    match config.request_timeout() {
        Some(timeout) => println!("  {:<24} {}s", "request timeout", timeout.as_secs()),
        None => println!("  {:<24} {}", "request timeout", "disabled".yellow()),
    }
    println!("  {:<24} {}", "log level", config.log().level());
    match config.log().file() {
        Some(path) => {
            println!("  {:<24} {}", "log file", path.display().to_string().cyan());
            println!("  {:<24} {}", "log rotation", config.log().rotation());
            println!("  {:<24} {}", "log files kept", config.log().max_files());
        }
        None => println!("  {:<24} {}", "log file", "tracing output".dimmed()),
    }
}
