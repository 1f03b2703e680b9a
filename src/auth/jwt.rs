/// JWT Token Generation and Validation
///
/// Access tokens and refresh tokens are both HS256 JWTs, signed with
/// separate secrets from `JwtSettings`.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::users::User;

/// Generate a new access token for a user
///
/// # Errors
/// Returns error if token generation fails
pub fn generate_access_token(user: &User, config: &JwtSettings) -> Result<String, AppError> {
    let claims = Claims::new(
        user.id,
        user.email.clone(),
        user.username.clone(),
        user.fullname.clone(),
        config.access_token_expiry,
        config.issuer.clone(),
    );

    sign(&claims, &config.secret)
}

/// Validate and extract claims from an access token
///
/// # Errors
/// `TokenExpired` for an expired token, `TokenInvalid` for anything else
/// (bad signature, wrong issuer, malformed).
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    verify(token, &config.secret, &config.issuer)
}

pub(crate) fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

pub(crate) fn verify<T: DeserializeOwned>(
    token: &str,
    secret: &str,
    issuer: &str,
) -> Result<T, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);

    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Auth(AuthError::TokenExpired),
            _ => AppError::Auth(AuthError::TokenInvalid),
        }
    })
}
