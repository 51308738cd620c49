use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use upload_types::TokenResponse;

use crate::error::{Result, ServerError};

/// Token type claim; rejects tokens minted for other purposes against this
/// service.
const TOKEN_TYPE: &str = "upload";

/// Settings for the request gate in front of the orchestrator: a static API
/// key that mints short-lived bearer tokens, and the secret/lifetime of
/// those tokens.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub api_key: String,
    pub token_secret: String,
    pub token_ttl: Duration,
}

impl AuthSettings {
    pub fn new(api_key: &str, token_secret: &str, token_ttl: Duration) -> Self {
        Self {
            api_key: api_key.to_owned(),
            token_secret: token_secret.to_owned(),
            token_ttl,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    typ: String,
    iat: u64,
    exp: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl AuthSettings {
    /// Checks the `X-Api-Key` header value against the configured key.
    pub fn check_api_key(&self, presented: Option<&str>) -> Result<()> {
        match presented {
            Some(key) if key == self.api_key => Ok(()),
            _ => Err(ServerError::Unauthorized("Invalid API key".to_owned())),
        }
    }

    /// Mints a short-lived upload token.
    pub fn issue_token(&self) -> Result<TokenResponse> {
        let now = unix_now();
        let claims = Claims {
            typ: TOKEN_TYPE.to_owned(),
            iat: now,
            exp: now + self.token_ttl.as_secs(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(self.token_secret.as_bytes()))
            .map_err(|e| ServerError::Internal(anyhow::anyhow!("token generation failed: {e}")))?;
        Ok(TokenResponse {
            token,
            expires_in: self.token_ttl.as_secs(),
        })
    }

    /// Validates an `Authorization` header value. Missing, malformed,
    /// expired, or mistyped tokens are all rejected before any orchestrator
    /// logic runs.
    pub fn verify_bearer(&self, authorization: Option<&str>) -> Result<()> {
        let header = authorization.ok_or_else(|| ServerError::Unauthorized("missing bearer token".to_owned()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServerError::Unauthorized("malformed Authorization header".to_owned()))?;

        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.token_secret.as_bytes()), &validation)
            .map_err(|e| ServerError::Unauthorized(format!("invalid token: {e}")))?;

        if data.claims.typ != TOKEN_TYPE {
            return Err(ServerError::Unauthorized("wrong token type".to_owned()));
        }
        Ok(())
    }
}
