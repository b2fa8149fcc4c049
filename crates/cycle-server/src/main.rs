mod cleanup;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::{Method, header::{AUTHORIZATION, CONTENT_TYPE}},
    routing::get,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use cycle_api::config::Config;
use cycle_api::images::CloudinaryClient;
use cycle_api::mail::SmtpMailer;
use cycle_api::routes;
use cycle_api::state::AppStateInner;
use cycle_db::Database;

/// Expired ephemeral tokens are purged once an hour.
const CLEANUP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cycle_market=debug,cycle_api=debug,cycle_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    let mailer = Arc::new(SmtpMailer::new(config.smtp.clone())?);
    if !config.smtp.is_configured() {
        warn!("MARKET_SMTP_HOST not set; account mail will be skipped");
    }
    let images = Arc::new(CloudinaryClient::new(config.cloud.clone()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let public_dir = config.public_dir.clone();

    let state = AppStateInner::new(db, config, mailer, images);

    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), CLEANUP_INTERVAL_SECS));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // The pages behind the mailed verification and reset links.
    let app = routes::router(state)
        .route("/health", get(|| async { "ok" }))
        .nest_service("/verify", ServeDir::new(public_dir.join("verify")))
        .nest_service("/reset-password", ServeDir::new(public_dir.join("reset-password")))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Cycle Market listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
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
