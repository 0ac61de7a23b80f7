use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use zone_server::arena::Arena;
use zone_server::config::ServerConfig;
use zone_server::sim_loop::{run_sim_loop, SimBroadcast, SimCommand};
use zone_server::ws::{ws_handler, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid server configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    let arena = Arc::new(Arena::new(&config));

    let (sim_tx, sim_rx) = mpsc::channel::<SimCommand>(256);
    let (broadcast_tx, _) = broadcast::channel::<SimBroadcast>(64);

    // Spawn simulation loop
    let bc_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        run_sim_loop(sim_rx, bc_tx, arena, config).await;
    });

    // Axum app
    let app_state = AppState {
        sim_tx,
        broadcast_tx,
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Starting zone server on {}", listen_addr);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", listen_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
