use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wanvid_worker::config::WorkerConfig;
use wanvid_worker::router::build_app_router;
use wanvid_worker::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wanvid_worker=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        engine_host = %config.engine_host,
        input_dir = %config.input_dir.display(),
        "Loaded worker configuration",
    );

    // --- Client identity ---
    // Generated once per process and threaded through every engine
    // call; jobs running concurrently share it and are told apart by
    // prompt id.
    let client_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(client_id = %client_id, "Generated engine client identity");

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, client_id);
    let app = build_app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {bind_addr}: {e}"));
    tracing::info!(addr = %bind_addr, "Worker listening");

    axum::serve(listener, app).await.expect("Server error");
}
