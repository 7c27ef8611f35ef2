use chunked_upload_service::api::middleware::request_id::REQUEST_ID_HEADER;
use chunked_upload_service::config::UploadConfig;
use chunked_upload_service::infrastructure::{database, storage};
use chunked_upload_service::services::record_store::RecordStore;
use chunked_upload_service::services::upload_coordinator::UploadCoordinator;
use chunked_upload_service::services::worker::BackgroundWorker;
use chunked_upload_service::{AppState, create_app};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chunked_upload_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !matches!(args.mode.as_str(), "api" | "worker" | "all") {
        anyhow::bail!("Unknown mode '{}', expected api, worker or all", args.mode);
    }

    info!("🚀 Starting Chunked Upload Service [Mode: {}]...", args.mode);

    // 2. Setup Common Infrastructure
    let config = UploadConfig::from_env();
    info!(
        "🛡️  Upload Config: Max Size={}MB, Chunk Size={}KB, Expiry={}h, Allowed Types={}",
        config.max_file_size / 1024 / 1024,
        config.chunk_size / 1024,
        config.cleanup_expiry_hours,
        if config.allowed_types.is_empty() {
            "any".to_string()
        } else {
            config.allowed_types.join(",")
        }
    );

    let db = database::setup_database().await?;
    let blob_store = storage::setup_storage(&config).await?;

    let coordinator = Arc::new(UploadCoordinator::new(
        RecordStore::new(db),
        blob_store,
        config.clone(),
    ));

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    // 4. Initialize Worker Service
    if args.mode == "worker" || args.mode == "all" {
        let worker = BackgroundWorker::new(
            coordinator.clone(),
            Duration::from_secs(config.cleanup_interval_secs),
            shutdown_rx.clone(),
        );
        handles.push(tokio::spawn(worker.run()));
        info!("👷 Worker service initialized.");
    }

    // 5. Initialize API Service
    if args.mode == "api" || args.mode == "all" {
        let state = AppState {
            coordinator: coordinator.clone(),
            config: config.clone(),
        };

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!(
            "📖 Swagger UI documentation: http://localhost:{}/swagger-ui",
            args.port
        );

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for Shutdown Signal
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down upload services...");
    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Service exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
