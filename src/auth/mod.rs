/// Authentication module
///
/// Handles JWT token generation/validation, password hashing,
/// and refresh token storage and rotation.

mod jwt;
mod password;
mod claims;
mod refresh_token;

pub use jwt::generate_access_token;
pub use jwt::validate_access_token;
pub use password::hash_password;
pub use password::verify_password;
pub use claims::{Claims, RefreshClaims};
pub use refresh_token::generate_refresh_token;
pub use refresh_token::validate_refresh_token;
pub use refresh_token::hash_token;
pub use refresh_token::token_matches;
pub use refresh_token::save_refresh_token;
pub use refresh_token::rotate_refresh_token;
pub use refresh_token::revoke_refresh_token;

/// Cookie carrying the access token
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
/// Cookie carrying the refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
