use anyhow::Context;
use api::{build_app, init_inference_provider, init_inference_service, init_metrics, AppState};
use config::{ApiConfig, LoggingConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // A missing .env file is fine; the variables may come from the environment
    let _ = dotenvy::dotenv();

    // Load configuration first to get logging settings
    let config = ApiConfig::load_from_env_or_file().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Application cannot start without a valid configuration.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    if let Err(e) = run(config).await {
        tracing::error!(error = %format!("{e:#}"), "Server stopped with an error");
        std::process::exit(1);
    }
}

async fn run(config: ApiConfig) -> anyhow::Result<()> {
    let (metrics_service, meter_provider) = init_metrics(&config.telemetry)?;

    let provider = init_inference_provider(&config.llm)?;
    let inference_service = init_inference_service(&config, provider, metrics_service.clone());

    let shutdown = CancellationToken::new();
    let app = build_app(AppState {
        inference_service,
        metrics_service,
        shutdown: shutdown.clone(),
    });

    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!(
        api = %config.llm.api,
        model = %config.llm.model,
        "Upstream provider configured"
    );
    tracing::info!("API Endpoints:");
    tracing::info!("  - POST /llm-inference-stream (Tutoring answer stream)");
    tracing::info!("  - GET /health (Health check)");
    tracing::info!("  - GET /docs (API documentation)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("HTTP server failed")?;

    if let Err(e) = meter_provider.shutdown() {
        tracing::warn!("Failed to flush metrics on shutdown: {}", e);
    }
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM, then end every open stream
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, closing open streams");
    shutdown.cancel();
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Build the filter string from the logging configuration
    let filter = logging_config.filter_directive();

    // Initialize tracing based on the format specified in config
    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
