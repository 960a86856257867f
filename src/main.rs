mod config;
mod errors;
mod extract;
mod feeds;
mod models;
mod pipeline;
mod report;
mod server;
mod state;

use crate::extract::ParameterSource;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("strike_odds starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let app_state = match state::AppState::from_config(cfg.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("startup error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        extractor = app_state.extractor.name(),
        risk_free_rate = cfg.simulation.risk_free_rate,
        paths = cfg.simulation.path_count,
        seed = cfg.simulation.seed,
        "simulation configured"
    );

    // One-shot mode: `strike_odds <question...>` prints the answer and exits
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let today = chrono::Local::now().date_naive();
        let answer = app_state.pipeline().answer(&args.join(" "), today).await;
        println!("{answer}");
        return;
    }

    let app = server::routes::router(app_state);

    let addr = format!("0.0.0.0:{}", cfg.server_port);
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}
