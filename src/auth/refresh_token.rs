/// Refresh Token Management
///
/// Refresh tokens are:
/// - HS256 JWTs signed with the refresh secret, carrying a random `jti`
/// - Stored server-side only as a SHA-256 hash, one per user
/// - Single-use: every refresh swaps the stored hash for the new token's
/// - Cleared on logout and on password change

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::claims::RefreshClaims;
use crate::auth::jwt::{sign, verify};
use crate::configuration::JwtSettings;
use crate::error::AppError;

const JTI_LENGTH: usize = 32;

/// Generate a new refresh token for `user_id`
pub fn generate_refresh_token(user_id: Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let jti: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(JTI_LENGTH)
        .map(char::from)
        .collect();

    let claims = RefreshClaims::new(
        user_id,
        jti,
        config.refresh_token_expiry,
        config.issuer.clone(),
    );

    sign(&claims, &config.refresh_secret)
}

/// Check signature, issuer and expiry of a refresh token
///
/// This says nothing about whether the token is still the user's current
/// one; compare against the stored hash with [`token_matches`].
pub fn validate_refresh_token(token: &str, config: &JwtSettings) -> Result<RefreshClaims, AppError> {
    verify(token, &config.refresh_secret, &config.issuer)
}

/// Hash a refresh token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether `token` is the one whose hash is stored
pub fn token_matches(stored_hash: Option<&str>, token: &str) -> bool {
    stored_hash.map_or(false, |stored| stored == hash_token(token))
}

/// Persist `token` as the user's current refresh token, replacing any previous one
pub async fn save_refresh_token(pool: &PgPool, user_id: Uuid, token: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET refresh_token_hash = $1, updated_at = now()
        WHERE id = $2
        "#,
    )
    .bind(hash_token(token))
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Atomically replace `old_token` with `new_token`
///
/// Returns `false` when `old_token` is no longer the stored token, i.e. a
/// concurrent refresh or a logout got there first.
pub async fn rotate_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    old_token: &str,
    new_token: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET refresh_token_hash = $1, updated_at = now()
        WHERE id = $2 AND refresh_token_hash = $3
        "#,
    )
    .bind(hash_token(new_token))
    .bind(user_id)
    .bind(hash_token(old_token))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Clear the user's stored refresh token
pub async fn revoke_refresh_token(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET refresh_token_hash = NULL, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(user_id = %user_id, "Refresh token revoked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 3600,
            refresh_secret: "test-refresh-secret-key-at-least-32-characters".to_string(),
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_refresh_token(user_id, &config).unwrap();
        let claims = validate_refresh_token(&token, &config).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.jti.len(), JTI_LENGTH);
        assert!(claims.jti.chars().all(|c| c.is_alphanumeric()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token1 = generate_refresh_token(user_id, &config).unwrap();
        let token2 = generate_refresh_token(user_id, &config).unwrap();

        assert_ne!(token1, token2);
        assert_ne!(hash_token(&token1), hash_token(&token2));
    }

    #[test]
    fn test_access_token_is_not_a_refresh_token() {
        let config = get_test_config();
        let access = crate::auth::generate_access_token(&crate::users::test_user(), &config).unwrap();

        let result = validate_refresh_token(&access, &config);
        assert!(matches!(result, Err(AppError::Auth(AuthError::TokenInvalid))));
    }

    #[test]
    fn test_expired_refresh_token() {
        let mut config = get_test_config();
        config.refresh_token_expiry = -120;
        let token = generate_refresh_token(Uuid::new_v4(), &config).unwrap();

        let result = validate_refresh_token(&token, &config);
        assert!(matches!(result, Err(AppError::Auth(AuthError::TokenExpired))));
    }

    #[test]
    fn test_token_hashing() {
        let token = "some-refresh-token";
        let hash1 = hash_token(token);

        assert_eq!(hash1, hash_token(token));
        assert_ne!(token, hash1);
        // SHA-256 hex
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_token_matches() {
        let token = "current-token";
        let stored = hash_token(token);

        assert!(token_matches(Some(&stored), token));
        assert!(!token_matches(Some(&stored), "previous-token"));
        assert!(!token_matches(None, token));
    }
}
