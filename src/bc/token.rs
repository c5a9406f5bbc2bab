//! OAuth2 client-credentials token provider.
//!
//! The token cache is process-wide with an explicit lifecycle: read path
//! through an `RwLock`, refresh serialized behind its own mutex so a burst
//! of callers with an expired token produces exactly one refresh request.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::BcConfig;
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

pub struct TokenProvider {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    expiry_margin: Duration,
    cached: RwLock<Option<CachedToken>>,
    refresh_gate: Mutex<()>,
}

impl TokenProvider {
    pub fn new(http: Client, cfg: &BcConfig) -> Self {
        Self {
            http,
            token_url: cfg.resolved_token_url(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            scope: cfg.scope.clone(),
            expiry_margin: Duration::seconds(cfg.token_expiry_margin_secs),
            cached: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Returns the cached bearer token, refreshing it when it is within the
    /// expiry margin. Concurrent callers needing a refresh serialize on the
    /// refresh gate; only the first performs the HTTP call.
    pub async fn access_token(&self) -> Result<String, ServiceError> {
        if let Some(token) = self.cached_if_fresh().await {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while this one waited on the gate
        if let Some(token) = self.cached_if_fresh().await {
            return Ok(token);
        }

        let fetched = self.fetch_token().await?;
        let token = fetched.token.clone();
        *self.cached.write().await = Some(fetched);
        info!("BC access token refreshed");
        Ok(token)
    }

    /// Drops the cached token; the next `access_token` call refetches.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
        debug!("BC access token invalidated");
    }

    async fn cached_if_fresh(&self) -> Option<String> {
        let guard = self.cached.read().await;
        guard
            .as_ref()
            .filter(|t| t.expires_at - self.expiry_margin > Utc::now())
            .map(|t| t.token.clone())
    }

    async fn fetch_token(&self) -> Result<CachedToken, ServiceError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("token request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("invalid token response: {}", e))
        })?;

        Ok(CachedToken {
            token: body.access_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> BcConfig {
        let mut cfg = BcConfig::default();
        cfg.tenant_id = "test-tenant".into();
        cfg.client_id = "client".into();
        cfg.client_secret = "secret".into();
        cfg.token_url = format!("{}/token", server.uri());
        cfg
    }

    #[tokio::test]
    async fn token_is_cached_between_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), &config_for(&server));

        assert_eq!(provider.access_token().await.unwrap(), "tok-1");
        assert_eq!(provider.access_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-2",
                "expires_in": 3600
            })))
            .expect(2)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), &config_for(&server));

        provider.access_token().await.unwrap();
        provider.invalidate().await;
        provider.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn token_within_expiry_margin_is_refreshed() {
        let server = MockServer::start().await;
        // expires_in below the 60s margin: every call must refetch
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-3",
                "expires_in": 10
            })))
            .expect(2)
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), &config_for(&server));

        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();
    }

    #[tokio::test]
    async fn token_endpoint_failure_is_an_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let provider = TokenProvider::new(Client::new(), &config_for(&server));

        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }
}
