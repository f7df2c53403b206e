mod app_error;
mod cli;
mod config;
mod controllers;
mod model;
mod repositories;
mod services;

use crate::cli::{Cli, Command};
use crate::config::config::Config;
use crate::controllers::estimate::{EstimatorState, post_estimate};
use crate::controllers::report::render_report;
use crate::repositories::gemini_repository::GeminiRepository;
use crate::services::image_codec::ImageCodec;
use crate::services::sampling_estimator::SamplingEstimator;
use axum::extract::DefaultBodyLimit;
use axum::{Router, routing::post};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    enable_logging(cli.verbose);
    let Some(config) = Config::from_path(&cli.config_path) else {
        return Ok(ExitCode::FAILURE);
    };
    let Some(api_key) = config.resolve_api_key(cli.api_key.as_deref()) else {
        error!(
            "No API key: pass --api-key, set GEMINI_API_KEY or fill model.api_key in {}",
            cli.config_path.display()
        );
        return Ok(ExitCode::FAILURE);
    };
    let client = GeminiRepository::new(config.model(), api_key)?;
    let estimator = SamplingEstimator::new(client, config.estimation());

    match cli.command {
        Command::Estimate {
            current,
            complete,
            runs,
            json,
        } => {
            let runs = runs.map_or(estimator.default_runs(), |runs| runs as usize);
            estimate(&estimator, &current, &complete, runs, json).await
        }
        Command::Serve { listen } => {
            let address = listen.unwrap_or(config.server().listen_address());
            serve(
                Arc::new(estimator),
                address,
                config.server().max_upload_bytes(),
            )
            .await
        }
    }
}

async fn estimate(
    estimator: &SamplingEstimator<GeminiRepository>,
    current: &Path,
    complete: &Path,
    runs: usize,
    json: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if !estimator.accepts_run_count(runs) {
        error!(
            "Run count must be between 1 and {} (estimation.max_runs)",
            estimator.max_runs()
        );
        return Ok(ExitCode::FAILURE);
    }
    let current = ImageCodec::open(current)?;
    let complete = ImageCodec::open(complete)?;

    info!("Analyzing images with {} runs", runs);
    let result = estimator.run(&current, &complete, runs).await?;
    let failed = result.failed_runs();
    if failed > 0 {
        warn!("{} of {} runs failed", failed, runs);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_report(&result));
    }
    Ok(if result.average.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn serve(
    state: EstimatorState<GeminiRepository>,
    address: SocketAddr,
    max_upload_bytes: usize,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let api_router = Router::new()
        .route("/estimate", post(post_estimate::<GeminiRepository>))
        .with_state(state);
    let app = Router::new()
        .nest("/v1", api_router)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        );

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(ExitCode::SUCCESS)
}

fn enable_logging(verbose: u8) {
    let log_level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
