use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supplies the bearer token attached to every request.
///
/// Token storage belongs to the login flow; this crate only reads it.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// A token fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the token from an environment variable on every call, so a
/// refreshed value is picked up without restarting.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TokenProvider for EnvToken {
    fn token(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|t| !t.trim().is_empty())
    }
}

/// Claims we look at when the bearer token happens to be a JWT.
///
/// The signature is never checked here; the backend does that.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject. Backends disagree on whether this is a string or a number.
    pub sub: Option<serde_json::Value>,
    /// Token expiration (Unix timestamp).
    pub exp: Option<usize>,
    /// Token issued-at (Unix timestamp).
    pub iat: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("no bearer token available")]
    Missing,
    #[error("bearer token has expired")]
    Expired,
}

/// Fetch the current token and reject it locally if it is missing or is a JWT
/// past its `exp`. Opaque tokens are passed through untouched.
pub fn bearer_token(provider: &dyn TokenProvider) -> Result<String, TokenError> {
    let token = provider
        .token()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(TokenError::Missing)?;

    check_expiry(&token)?;
    Ok(token)
}

/// Reject a JWT whose `exp` is in the past (with the library's default
/// leeway). Anything that does not decode as a JWT is accepted.
pub fn check_expiry(token: &str) -> Result<(), TokenError> {
    if token.split('.').count() != 3 {
        return Ok(());
    }

    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(_) => Ok(()),
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Err(TokenError::Expired),
        Err(e) => {
            tracing::debug!("Bearer token is not a readable JWT ({e}), sending as-is");
            Ok(())
        }
    }
}
