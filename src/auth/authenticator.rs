//! Request authentication for the Payday API
//!
//! Bearer tokens are attached as-is. Client-credentials tokens are fetched
//! lazily, cached behind a mutex and re-requested once they near expiry.

use super::types::{AuthConfig, CachedToken};
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

/// Attaches credentials to outgoing requests
pub struct Authenticator {
    config: AuthConfig,
    token: Mutex<Option<CachedToken>>,
    http_client: Client,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Use `http_client` for token requests
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            token: Mutex::new(None),
            http_client,
        }
    }

    /// Add the `Authorization` header required by the configured scheme
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config {
            AuthConfig::None => Ok(req),
            AuthConfig::Bearer { token } => Ok(req.bearer_auth(token)),
            AuthConfig::Oauth2ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scopes,
            } => {
                // Held across the token request so concurrent callers share one fetch
                let mut slot = self.token.lock().await;
                if let Some(token) = slot.as_ref().filter(|t| !t.is_expired()) {
                    return Ok(req.bearer_auth(&token.token));
                }
                let fresh = self
                    .request_token(token_url, client_id, client_secret, scopes)
                    .await?;
                let req = req.bearer_auth(&fresh.token);
                *slot = Some(fresh);
                Ok(req)
            }
        }
    }

    async fn request_token(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        scopes: &[String],
    ) -> Result<CachedToken> {
        let scope = scopes.join(" ");
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        if !scope.is_empty() {
            form.push(("scope", scope.as_str()));
        }

        debug!("Requesting access token from {}", token_url);
        let response = self
            .http_client
            .post(token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth2 {
                message: format!("Token request failed with status {}: {body}", status.as_u16()),
            });
        }

        let grant: TokenGrant = response.json().await?;
        Ok(match grant.expires_in {
            Some(seconds) => CachedToken::expires_in(grant.access_token, seconds),
            None => CachedToken::new(grant.access_token, None),
        })
    }

    /// Drop the cached token so the next request fetches a new one
    pub async fn clear_cache(&self) {
        self.token.lock().await.take();
    }
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}
