//! Verification email delivery
//!
//! Only the link is built here; messages are written to the log instead of a
//! mail provider.

use anyhow::Result;
use reqwest::Url;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Base URL of the client app, verification links point at it
    pub client_app_url: String,
}

impl EmailConfig {
    /// Reads `CLIENT_APP_URL` (default: `http://localhost:3000`)
    pub fn from_env() -> Self {
        let client_app_url = std::env::var("CLIENT_APP_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Self { client_app_url }
    }
}

#[derive(Debug, Clone)]
pub struct EmailSender {
    verify_url: Url,
}

impl EmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let base = Url::parse(&config.client_app_url)?;
        let verify_url = base.join("account/verifyEmail")?;

        Ok(Self { verify_url })
    }

    pub fn verification_link(&self, token: &str, email: &str) -> Result<Url> {
        let link = Url::parse_with_params(
            self.verify_url.as_str(),
            &[("token", token), ("email", email)],
        )?;
        Ok(link)
    }

    pub async fn send_verification(&self, email: &str, token: &str) -> Result<()> {
        let link = self.verification_link(token, email)?;
        info!(to = %email, link = %link, "Sending email verification link");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_encodes_token_and_email() {
        let sender = EmailSender::new(&EmailConfig {
            client_app_url: "http://localhost:3000".to_string(),
        })
        .unwrap();

        let link = sender.verification_link("abc123", "bob+1@test.com").unwrap();

        assert_eq!(link.path(), "/account/verifyEmail");
        let pairs: Vec<(String, String)> = link
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("token".to_string(), "abc123".to_string()),
                ("email".to_string(), "bob+1@test.com".to_string()),
            ]
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = EmailConfig {
            client_app_url: "not a url".to_string(),
        };
        assert!(EmailSender::new(&config).is_err());
    }
}
