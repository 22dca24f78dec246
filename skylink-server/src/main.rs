//! Binary crate for the `skylink` server.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive credential configuration
//! - Serving the HTTP routes over the core providers

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod error;

/// Set to "1" or "true" for newline-delimited JSON logs.
const LOG_JSON_ENV: &str = "SKYLINK_LOG_JSON";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));

    let json = std::env::var(LOG_JSON_ENV)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
