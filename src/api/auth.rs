//! Bearer token verification
//!
//! Plan and admin routes run behind [`require_principal`]. With auth enabled
//! the `Authorization: Bearer <jwt>` header is verified and the resulting
//! [`Principal`] is attached as a request extension; with auth disabled every
//! request is served as the anonymous principal.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::core::config::AuthConfig;

use super::response::ApiError;
use crate::core::app_state::SharedState;
use crate::core::error::{Error, Result};
use crate::types::Principal;

/// Turns a bearer token into a principal
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the caller it identifies
    fn verify(&self, token: &str) -> Result<Principal>;
}

/// Claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// HS256 JWT verifier checking signature, expiry, issuer and audience
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
}

impl JwtVerifier {
    /// Create a verifier for tokens signed with `secret`
    pub fn new(secret: &[u8], issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: issuer.to_string(),
            audience: audience.to_string(),
        }
    }

    /// Verifier for the configured issuer, audience and secret
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::config("No auth secret is configured"))?;
        Ok(Self::new(secret.as_bytes(), &config.issuer, &config.audience))
    }

    /// Sign a token for `subject` valid for `ttl_secs`
    pub fn issue(&self, subject: &str, ttl_secs: u64) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::unauthorized(format!("System time error: {}", e)))?
            .as_secs();

        let claims = Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: now + ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::unauthorized(format!("Failed to sign token: {}", e)))
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Principal> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|err| {
            let reason = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidSignature => "Invalid signature",
                ErrorKind::InvalidIssuer => "Invalid issuer",
                ErrorKind::InvalidAudience => "Invalid audience",
                ErrorKind::MissingRequiredClaim(_) => "Missing required claim",
                _ => "Invalid token",
            };
            Error::unauthorized(reason)
        })?;

        Ok(Principal {
            subject: data.claims.sub,
        })
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

/// Middleware attaching the verified [`Principal`] to the request
pub async fn require_principal(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let principal = match &state.verifier {
        None => Principal::anonymous(),
        Some(verifier) => {
            let token = bearer_token(&request)
                .ok_or_else(|| state.reject(Error::unauthorized("Missing bearer token")))?;
            verifier.verify(token).map_err(|e| state.reject(e))?
        }
    };

    tracing::trace!(subject = %principal.subject, "Request authenticated");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
