//! Service configuration

use anyhow::Result;
use axum::http::{HeaderValue, Method, header};
use std::{env, net::SocketAddr};
use tower_http::cors::CorsLayer;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the account service binds to
    pub bind_addr: SocketAddr,
    /// Origin of the client app, the only one CORS lets through
    pub client_origin: String,
}

impl ServiceConfig {
    /// # Environment Variables
    /// - `AUTH_ADDR`: bind address (default: `0.0.0.0:5001`)
    /// - `CLIENT_ORIGIN`: allowed CORS origin (default: `http://localhost:3000`)
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("AUTH_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:5001".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid AUTH_ADDR: {}", e))?;

        let client_origin =
            env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_addr,
            client_origin,
        })
    }

    pub fn cors_layer(&self) -> Result<CorsLayer> {
        let origin = HeaderValue::from_str(&self.client_origin)
            .map_err(|e| anyhow::anyhow!("Invalid CLIENT_ORIGIN: {}", e))?;

        Ok(CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_without_env() {
        unsafe {
            env::remove_var("AUTH_ADDR");
            env::remove_var("CLIENT_ORIGIN");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.bind_addr.port(), 5001);
        assert_eq!(config.client_origin, "http://localhost:3000");
        assert!(config.cors_layer().is_ok());
    }

    #[test]
    #[serial]
    fn malformed_address_is_rejected() {
        unsafe {
            env::set_var("AUTH_ADDR", "localhost");
        }
        assert!(ServiceConfig::from_env().is_err());

        unsafe {
            env::remove_var("AUTH_ADDR");
        }
    }
}
