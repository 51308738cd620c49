//! Bearer-token handling for the HTTP transport.
//!
//! The service mints short-lived tokens in exchange for an API key;
//! [`TokenProvider`] caches the current token and re-fetches it when it is
//! about to expire. [`AuthMiddleware`] attaches it to every outbound request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::AUTHORIZATION;
use http::HeaderValue;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use tokio::sync::Mutex;
use tracing::debug;
use upload_types::TokenResponse;

use crate::error::{Result, UploadClientError};

/// Tokens within this margin of expiry are refreshed eagerly, so a request
/// never departs with a token that dies in flight.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Client-side auth configuration: an API key for minting tokens, an
/// already-held token, or both.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// API key presented to the token endpoint.
    pub api_key: Option<String>,
    /// Pre-fetched bearer token to start with.
    pub token: Option<String>,
    /// Remaining lifetime of `token` in seconds, if known.
    pub token_expires_in: Option<u64>,
}

struct TokenState {
    token: String,
    expires_at: Instant,
}

/// Holds the current bearer token and refreshes it via the API key when it
/// nears expiry. The lock is held across the refresh call; that is fine,
/// since without a valid token no concurrent request could succeed anyway.
pub struct TokenProvider {
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
    current: Mutex<Option<TokenState>>,
}

impl TokenProvider {
    pub fn new(endpoint: &str, config: &AuthConfig) -> Self {
        let current = config.token.as_ref().map(|token| TokenState {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(config.token_expires_in.unwrap_or(0)),
        });
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            http: reqwest::Client::new(),
            current: Mutex::new(current),
        }
    }

    pub async fn get_valid_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(state) = current.as_ref() {
            if state.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(state.token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *current = Some(fresh);
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<TokenState> {
        let Some(api_key) = &self.api_key else {
            return Err(UploadClientError::AuthError(
                "token expired and no API key is configured to refresh it".to_owned(),
            ));
        };

        let response = self
            .http
            .post(format!("{}/auth/token", self.endpoint))
            .header("X-Api-Key", api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadClientError::AuthError(format!("token request rejected with status {status}")));
        }

        let body: TokenResponse = response.json().await?;
        debug!("fetched upload token (expires in {}s)", body.expires_in);
        Ok(TokenState {
            token: body.token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        })
    }
}

/// Middleware that adds the bearer token to outbound requests, refreshing it
/// first when needed.
pub struct AuthMiddleware {
    token_provider: Arc<TokenProvider>,
}

impl AuthMiddleware {
    pub fn new(endpoint: &str, config: &AuthConfig) -> Self {
        Self {
            token_provider: Arc::new(TokenProvider::new(endpoint, config)),
        }
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = self
            .token_provider
            .get_valid_token()
            .await
            .map_err(|e| reqwest_middleware::Error::Middleware(anyhow::anyhow!("couldn't get token: {e}")))?;

        let header = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| reqwest_middleware::Error::Middleware(anyhow::anyhow!("invalid token header: {e}")))?;
        req.headers_mut().insert(AUTHORIZATION, header);
        next.run(req, extensions).await
    }
}
