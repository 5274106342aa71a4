mod cli;
mod output;

use std::{env, process::ExitCode};

use clap::Parser;
use dotenv_flow::dotenv_flow;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // Load dotenv-flow variables
    dotenv_flow().ok();

    // Enable logging
    config_tracing();

    let cli = Cli::parse();
    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn config_tracing() {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(tracing::Level::INFO);

    // Logs go to stderr so that command output stays machine readable.
    let (plain, json) = match env::var("LOG_FORMAT").as_deref() {
        Ok("json") => (None, Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))),
        _ => (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None),
    };
    let filter = filter::Targets::new()
        .with_target("hyper", tracing::Level::INFO)
        .with_target("reqwest", tracing::Level::INFO)
        .with_default(level);

    tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .init();
}
