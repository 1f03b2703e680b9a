/// Session Routes
///
/// Registration, login, logout and refresh-token rotation.

use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::{
    generate_access_token, generate_refresh_token, hash_password, revoke_refresh_token,
    rotate_refresh_token, save_refresh_token, token_matches, validate_refresh_token,
    verify_password, Claims, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
};
use crate::configuration::{ApplicationSettings, JwtSettings};
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext, ValidationError};
use crate::media_client::MediaClient;
use crate::response::ApiResponse;
use crate::routes::uploads::{discard_uploads, optional_image, require_image, upload_image};
use crate::security::RateLimiterManager;
use crate::users::{self, NewUser, PublicUser, User};
use crate::validators::{is_valid_email, is_valid_name, is_valid_username, require_field};

/// Multipart body of `POST /register`
#[derive(MultipartForm)]
pub struct RegisterForm {
    pub fullname: Option<Text<String>>,
    pub email: Option<Text<String>>,
    pub username: Option<Text<String>>,
    pub password: Option<Text<String>>,
    pub avatar: Option<TempFile>,
    #[multipart(rename = "coverImage")]
    pub cover_image: Option<TempFile>,
}

/// Login with either email or username
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

/// Refresh token in the body, for clients that do not keep cookies
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Issued token pair, plus the user on login
#[derive(Serialize)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

struct TokenPair {
    access_token: String,
    refresh_token: String,
}

fn issue_tokens(user: &User, jwt_config: &JwtSettings) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: generate_access_token(user, jwt_config)?,
        refresh_token: generate_refresh_token(user.id, jwt_config)?,
    })
}

fn text_field(field: &Option<Text<String>>) -> Option<&str> {
    field.as_ref().map(|text| text.0.as_str())
}

pub(crate) fn auth_cookie(
    name: &'static str,
    value: String,
    max_age_seconds: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(max_age_seconds))
        .finish()
}

pub(crate) fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .secure(secure)
        .finish();
    cookie.make_removal();
    cookie
}

/// Response carrying a fresh token pair both as cookies and in the body
fn token_response(
    tokens: TokenPair,
    user: Option<PublicUser>,
    message: &str,
    jwt_config: &JwtSettings,
    app_settings: &ApplicationSettings,
) -> HttpResponse {
    let secure = app_settings.secure_cookies;
    let access_cookie = auth_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        jwt_config.access_token_expiry,
        secure,
    );
    let refresh_cookie = auth_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        jwt_config.refresh_token_expiry,
        secure,
    );

    let body = ApiResponse::ok(
        AuthResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: jwt_config.access_token_expiry,
        },
        message,
    );

    body.builder()
        .cookie(access_cookie)
        .cookie(refresh_cookie)
        .json(body)
}

/// POST /api/v1/users/register
///
/// Multipart registration. The avatar is required, the cover image is
/// optional; both go to the media host before the user row is written.
///
/// # Errors
/// - 400: Missing/invalid fields, weak password, missing avatar, non-image or oversized file
/// - 409: Email or username already taken
/// - 502: Media host upload failed
pub async fn register(
    req: HttpRequest,
    MultipartForm(form): MultipartForm<RegisterForm>,
    pool: web::Data<PgPool>,
    media: web::Data<MediaClient>,
    app_settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "user_registration");

    let fullname = require_field(text_field(&form.fullname), "fullname")?;
    let email = require_field(text_field(&form.email), "email")?;
    let username = require_field(text_field(&form.username), "username")?;
    let password = require_field(text_field(&form.password), "password")?;

    let fullname = is_valid_name(&fullname)?;
    let email = is_valid_email(&email)?;
    let username = is_valid_username(&username)?;

    let password_hash = hash_password(&password, "password")?;

    if users::exists_with_email_or_username(pool.get_ref(), &email, &username).await? {
        return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
            "User with email or username already exists".to_string(),
        )));
    }

    let max_bytes = app_settings.max_upload_bytes;
    let avatar_file = require_image(form.avatar, "avatar", max_bytes)?;
    let cover_file = optional_image(form.cover_image, "coverImage", max_bytes)?;

    let avatar = upload_image(media.get_ref(), avatar_file)
        .await
        .map_err(|e| context.log_error(e))?;

    let cover_image = match cover_file {
        Some(file) => match upload_image(media.get_ref(), file).await {
            Ok(uploaded) => Some(uploaded),
            Err(e) => {
                discard_uploads(media.get_ref(), &[&avatar]).await;
                return Err(context.log_error(e));
            }
        },
        None => None,
    };

    let new_user = NewUser {
        username,
        email,
        fullname,
        password_hash,
        avatar: avatar.url.clone(),
        avatar_public_id: Some(avatar.public_id.clone()),
        cover_image: cover_image.as_ref().map(|c| c.url.clone()).unwrap_or_default(),
        cover_image_public_id: cover_image.as_ref().map(|c| c.public_id.clone()),
    };

    let user = match users::insert(pool.get_ref(), new_user).await {
        Ok(user) => user,
        Err(e) => {
            let mut orphans = vec![&avatar];
            orphans.extend(cover_image.as_ref());
            discard_uploads(media.get_ref(), &orphans).await;
            return Err(e);
        }
    };

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        PublicUser::from(user),
        "User registered successfully",
    )
    .into_response())
}

/// POST /api/v1/users/login
///
/// # Errors
/// - 400: Neither email nor username given
/// - 401: Unknown user or wrong password (same response for both)
/// - 429: Too many attempts from this client
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    app_settings: web::Data<ApplicationSettings>,
    rate_limiter: web::Data<RateLimiterManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "user_login");

    let client_ip = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    if !rate_limiter.check_rate_limit(&client_ip) {
        tracing::warn!(request_id = %context.request_id, client_ip = %client_ip, "Login rate limit exceeded");
        return Err(AppError::Auth(AuthError::TooManyAttempts));
    }

    let normalize = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase)
    };
    let email = normalize(&form.email);
    let username = normalize(&form.username);

    if email.is_none() && username.is_none() {
        return Err(AppError::Validation(ValidationError::EmptyField(
            "email or username".to_string(),
        )));
    }

    let user = users::find_by_login(pool.get_ref(), email.as_deref(), username.as_deref())
        .await?
        .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    if !verify_password(&form.password, &user.password_hash)? {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let tokens = issue_tokens(&user, jwt_config.get_ref())?;
    save_refresh_token(pool.get_ref(), user.id, &tokens.refresh_token).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(token_response(
        tokens,
        Some(PublicUser::from(user)),
        "User logged in successfully",
        jwt_config.get_ref(),
        app_settings.get_ref(),
    ))
}

/// POST /api/v1/users/logout
///
/// Requires a valid access token. Drops the stored refresh token and
/// clears both auth cookies.
pub async fn logout(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
    app_settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::for_request(&req, "user_logout").with_user_id(user_id.to_string());

    revoke_refresh_token(pool.get_ref(), user_id).await?;

    tracing::info!(request_id = %context.request_id, user_id = %user_id, "User logged out");

    let secure = app_settings.secure_cookies;
    let body = ApiResponse::ok(serde_json::json!({}), "User logged out");
    Ok(body
        .builder()
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE, secure))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE, secure))
        .json(body))
}

/// POST /api/v1/users/refresh-token
///
/// Refresh token rotation: the presented token must be the one stored for
/// the user; it is swapped for a new one atomically, so each refresh token
/// works exactly once.
///
/// # Reuse detection
/// A validly signed token that is no longer the stored one means it was
/// already rotated (or leaked). The stored token is cleared as well, which
/// forces the legitimate holder to log in again.
///
/// # Errors
/// - 401: Missing, invalid, expired, reused, or concurrently rotated token
pub async fn refresh_access_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    app_settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::for_request(&req, "token_refresh");

    let incoming = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| body.and_then(|json| json.into_inner().refresh_token))
        .filter(|token| !token.is_empty())
        .ok_or(AppError::Auth(AuthError::MissingToken))?;

    let claims = validate_refresh_token(&incoming, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;

    let user = users::find_by_id(pool.get_ref(), user_id)
        .await?
        .ok_or(AppError::Auth(AuthError::TokenInvalid))?;

    if !token_matches(user.refresh_token_hash.as_deref(), &incoming) {
        if user.refresh_token_hash.is_some() {
            tracing::warn!(
                request_id = %context.request_id,
                user_id = %user_id,
                "Stale refresh token presented, revoking current session"
            );
            revoke_refresh_token(pool.get_ref(), user_id).await?;
        }
        return Err(AppError::Auth(AuthError::TokenInvalid));
    }

    let tokens = issue_tokens(&user, jwt_config.get_ref())?;
    if !rotate_refresh_token(pool.get_ref(), user_id, &incoming, &tokens.refresh_token).await? {
        tracing::warn!(
            request_id = %context.request_id,
            user_id = %user_id,
            "Refresh token rotated concurrently"
        );
        return Err(AppError::Auth(AuthError::TokenInvalid));
    }

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "Token refreshed successfully"
    );

    Ok(token_response(
        tokens,
        None,
        "Access token refreshed",
        jwt_config.get_ref(),
        app_settings.get_ref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookie_attributes() {
        let cookie = auth_cookie(ACCESS_TOKEN_COOKIE, "token".to_string(), 900, true);

        assert_eq!(cookie.name(), "accessToken");
        assert_eq!(cookie.value(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(900)));
    }

    #[test]
    fn test_removal_cookie_expires_immediately() {
        let cookie = removal_cookie(REFRESH_TOKEN_COOKIE, false);

        assert_eq!(cookie.name(), "refreshToken");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }

    #[test]
    fn test_auth_response_omits_missing_user() {
        let response = AuthResponse {
            user: None,
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 900,
        };
        let json = serde_json::to_value(&response).unwrap();

        assert!(json.get("user").is_none());
        assert_eq!(json["token_type"], "Bearer");
    }
}
