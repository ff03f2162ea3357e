use anyhow::Result;
use common::{
    database,
    jwt::{JwtConfig, JwtService},
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod email;
mod error;
mod middleware;
mod models;
mod repositories;
mod routes;
mod session;

#[cfg(test)]
mod account_flows;

use crate::{
    config::ServiceConfig,
    email::{EmailConfig, EmailSender},
    repositories::{RefreshTokenRepository, UserRepository},
    session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub sessions: SessionManager,
    pub users: UserRepository,
    pub mailer: EmailSender,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting account service");

    let service_config = ServiceConfig::from_env()?;

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;
    let users = UserRepository::new(pool.clone());
    let sessions = SessionManager::new(
        jwt_service,
        users.clone(),
        RefreshTokenRepository::new(pool.clone()),
    );
    let mailer = EmailSender::new(&EmailConfig::from_env())?;

    let app_state = AppState {
        db_pool: pool,
        sessions,
        users,
        mailer,
    };

    let app = routes::create_router(app_state, service_config.cors_layer()?);

    let listener = TcpListener::bind(service_config.bind_addr).await?;
    info!("Account service listening on {}", service_config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
