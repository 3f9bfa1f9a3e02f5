//! Stockkeeper API server entry point.

use std::error::Error;
use std::net::SocketAddr;

use sqlx::postgres::PgPoolOptions;
use stockkeeper_api::config::AppConfig;
use stockkeeper_api::error::AppError;
use stockkeeper_api::state::AppState;
use stockkeeper_api::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init_tracing(config.otlp_endpoint.as_deref())?;

    tracing::info!(
        strategy = %config.concurrency.strategy,
        "Starting Stockkeeper API server"
    );

    let app_state = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(AppError::from)?;
            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .map_err(AppError::from)?;
            AppState::postgres(pool, &config.concurrency)?
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            AppState::in_memory(&config.concurrency)?
        }
    };

    let app = stockkeeper_api::app(app_state);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AppError::from)?;

    axum::serve(listener, app).await.map_err(AppError::from)?;

    Ok(())
}
