use anyhow::Result;
use common::{
    database::{self, DatabaseConfig},
    jwt::{JwtConfig, JwtService},
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod chat;
mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod repositories;
mod routes;
mod state;

use crate::{config::ServiceConfig, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting activities service");

    let service_config = ServiceConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;
    let app_state = AppState::new(pool, jwt_service);

    let app = routes::create_router(app_state, service_config.cors_layer()?);

    let listener = TcpListener::bind(service_config.bind_addr).await?;
    info!("Activities service listening on {}", service_config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
