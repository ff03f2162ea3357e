//! Service configuration

use anyhow::Result;
use axum::http::{HeaderName, HeaderValue, Method, header};
use common::PaginationHeader;
use std::{env, net::SocketAddr};
use tower_http::cors::CorsLayer;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the activities service binds to
    pub bind_addr: SocketAddr,
    /// Origin of the client app, the only one CORS lets through
    pub client_origin: String,
}

impl ServiceConfig {
    /// # Environment Variables
    /// - `API_ADDR`: bind address (default: `0.0.0.0:5000`)
    /// - `CLIENT_ORIGIN`: allowed CORS origin (default: `http://localhost:3000`)
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("API_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:5000".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid API_ADDR: {}", e))?;

        let client_origin =
            env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_addr,
            client_origin,
        })
    }

    /// CORS for the client app; the paging header must be readable by it
    pub fn cors_layer(&self) -> Result<CorsLayer> {
        let origin = HeaderValue::from_str(&self.client_origin)
            .map_err(|e| anyhow::anyhow!("Invalid CLIENT_ORIGIN: {}", e))?;
        let pagination = HeaderName::from_bytes(PaginationHeader::NAME.as_bytes())?;

        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .expose_headers([pagination])
            .allow_credentials(true))
    }
}
