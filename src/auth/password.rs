/// Password hashing (bcrypt) and strength rules

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password using bcrypt after checking its strength
///
/// `field` names the request field in validation errors
/// (`password` on register, `new_password` on change).
pub fn hash_password(password: &str, field: &str) -> Result<String, AppError> {
    validate_password_strength(password, field)?;

    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Only if the stored hash is malformed; a wrong password is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// Requirements:
/// - 8 to 128 characters
/// - At least one digit, one lowercase letter and one uppercase letter
fn validate_password_strength(password: &str, field: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(field.to_string(), MIN_PASSWORD_LENGTH));
    }

    // bcrypt limitation and DoS prevention
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_PASSWORD_LENGTH));
    }

    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::Invalid(format!(
            "{} must contain at least one digit, one lowercase letter, and one uppercase letter",
            field
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password(password, "password").expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("ValidPassword123", "password").expect("Failed to hash password");

        assert!(verify_password("ValidPassword123", &hash).unwrap());
        assert!(!verify_password("WrongPassword123", &hash).unwrap());
    }

    #[test]
    fn test_verify_against_malformed_hash() {
        assert!(verify_password("ValidPassword123", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn test_weak_passwords_rejected() {
        let too_long = "a".repeat(MAX_PASSWORD_LENGTH + 1) + "A1";
        for weak in ["Short1", "NoDigitsPassword", "NOLOWERCASE1", "nouppercase1", too_long.as_str()] {
            assert!(hash_password(weak, "password").is_err(), "accepted {}", weak);
        }
    }

    #[test]
    fn test_error_names_field() {
        let err = hash_password("Short1", "new_password").unwrap_err();
        assert!(err.to_string().starts_with("new_password"));
    }
}
