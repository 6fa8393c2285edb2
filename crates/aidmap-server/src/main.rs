mod config;
mod expiry;

use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use aidmap_api::AppStateInner;
use aidmap_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "aidmap_server=debug,aidmap_api=debug,aidmap_db=info,tower_http=debug".into()
                }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       AIDMAP_ENCRYPTION_KEY must be 64 hex characters (32 bytes).");
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.db_path)?;
    let state = AppStateInner::new(db, config.cipher);

    match config.expiry_sweep {
        Some(every) => {
            tokio::spawn(expiry::run_expiry_loop(state.clone(), every));
            info!("Expiry sweep every {}s", every.as_secs());
        }
        None => info!("Expiry sweep disabled"),
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    info!("CORS origins: {:?}", config.allowed_origins);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let app = aidmap_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Aidmap server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
