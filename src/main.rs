mod completion;
mod config;
mod server;
mod skill;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use completion::Client as CompletionClient;
use config::Config;
use skill::{Sanitizer, Skill, Storyteller, TracingReporter};

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1);
    let loaded = match &config_path {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("storyteller.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting storyteller...");
    match &config_path {
        Some(path) => info!("Loaded config from {path}"),
        None => info!("No config file given, using defaults"),
    }
    info!(
        "Model {} (max_tokens={}, temperature={}, frequency_penalty={}), timeout {:?}",
        config.completion.model,
        config.completion.max_tokens,
        config.completion.temperature,
        config.completion.frequency_penalty,
        config.timeout
    );

    let completer = Arc::new(CompletionClient::new(
        config.api_key.clone(),
        config.api_base_url.clone(),
        config.completion.clone(),
    ));
    let storyteller = Storyteller::new(
        completer,
        Sanitizer::new(config.word_filter.clone(), config.placeholder),
        config.story_voice.clone(),
        config.timeout,
    );
    let skill = Arc::new(Skill::new(storyteller, Arc::new(TracingReporter)));

    let listener = match TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {e}", config.listen_addr);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", config.listen_addr);

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down");
    };
    if let Err(e) = axum::serve(listener, server::router(skill))
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("Server error: {e}");
    }
}
