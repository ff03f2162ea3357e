//! Client configuration

use std::env;

/// Where the client finds the two services and the comment relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base of the activities API
    pub api_url: String,
    /// Base of the account endpoints
    pub account_url: String,
    /// WebSocket endpoint of the comment relay
    pub chat_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            account_url: "http://localhost:5001/api/account".to_string(),
            chat_url: "ws://localhost:5000/chat".to_string(),
        }
    }
}

impl ClientConfig {
    /// # Environment Variables
    /// - `API_URL`: activities API base (default: `http://localhost:5000/api`)
    /// - `ACCOUNT_URL`: account endpoints (default: `http://localhost:5001/api/account`)
    /// - `CHAT_URL`: comment relay (default: `ws://localhost:5000/chat`)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_url: env::var("API_URL").unwrap_or(defaults.api_url),
            account_url: env::var("ACCOUNT_URL").unwrap_or(defaults.account_url),
            chat_url: env::var("CHAT_URL").unwrap_or(defaults.chat_url),
        }
    }
}
