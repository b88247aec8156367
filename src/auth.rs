//! Bearer-token session for the Nginx Proxy Manager API
//! Exchanges credentials at /api/tokens and refreshes the token before expiry

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};

/// Tokens are issued for 24 hours; treat them as stale after 23 so a
/// refresh always happens before the server-side expiry.
const TOKEN_LIFETIME_HOURS: i64 = 23;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// Credentials plus the current bearer token for one client instance.
/// Scoped to the client, never global; refreshed transparently between
/// sequential requests.
#[derive(Debug)]
pub struct AuthSession {
    identity: String,
    secret: String,
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn new(identity: &str, secret: &str) -> Self {
        Self {
            identity: identity.to_string(),
            secret: secret.to_string(),
            token: None,
            expires_at: None,
        }
    }

    /// The account identity, also used as the default Let's Encrypt email.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Exchange credentials for a fresh bearer token.
    pub async fn authenticate(&mut self, http: &Client, base_url: &str) -> Result<()> {
        let url = format!("{}/api/tokens", base_url);
        let payload = json!({
            "identity": self.identity,
            "secret": self.secret,
        });

        let response = http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Authentication(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Authentication(format!(
                "token endpoint returned HTTP {}",
                status
            )));
        }

        let data: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("malformed token response: {}", e)))?;

        self.token = Some(data.token);
        self.expires_at = Some(Utc::now() + Duration::hours(TOKEN_LIFETIME_HOURS));
        debug!("obtained bearer token for {}", self.identity);

        Ok(())
    }

    /// Current bearer token, re-authenticating first if missing or stale.
    pub async fn bearer_token(&mut self, http: &Client, base_url: &str) -> Result<String> {
        if self.is_stale() {
            self.authenticate(http, base_url).await?;
        }

        match &self.token {
            Some(token) => Ok(token.clone()),
            None => Err(Error::Authentication("no token after authentication".into())),
        }
    }

    fn is_stale(&self) -> bool {
        match (&self.token, self.expires_at) {
            (Some(_), Some(expires_at)) => Utc::now() >= expires_at,
            _ => true,
        }
    }
}
