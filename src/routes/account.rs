/// Account Routes
///
/// Everything an authenticated user can do to their own account. All of
/// these sit behind `JwtMiddleware`, which injects the access token claims.

use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::{hash_password, verify_password, Claims, REFRESH_TOKEN_COOKIE};
use crate::configuration::ApplicationSettings;
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::media_client::MediaClient;
use crate::response::ApiResponse;
use crate::routes::auth::removal_cookie;
use crate::routes::uploads::{discard_replaced, discard_uploads, require_image, upload_image};
use crate::users::{self, ImageSlot, PublicUser};
use crate::validators::{is_valid_email, is_valid_name};

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct UpdateAccountRequest {
    pub fullname: Option<String>,
    pub email: Option<String>,
}

#[derive(MultipartForm)]
pub struct AvatarForm {
    pub avatar: Option<TempFile>,
}

#[derive(MultipartForm)]
pub struct CoverImageForm {
    #[multipart(rename = "coverImage")]
    pub cover_image: Option<TempFile>,
}

/// GET /api/v1/users/current-user
///
/// # Errors
/// - 404: The account behind the token no longer exists
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = users::get_by_id(pool.get_ref(), claims.user_id()?).await?;

    Ok(ApiResponse::ok(PublicUser::from(user), "Current user fetched successfully").into_response())
}

/// POST /api/v1/users/change-password
///
/// Also revokes the stored refresh token, so other sessions have to log
/// in again once their access token runs out.
///
/// # Errors
/// - 400: Wrong old password, or new password too weak
pub async fn change_password(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    form: web::Json<ChangePasswordRequest>,
    pool: web::Data<PgPool>,
    app_settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::for_request(&req, "change_password").with_user_id(user_id.to_string());

    let user = users::get_by_id(pool.get_ref(), user_id).await?;

    if !verify_password(&form.old_password, &user.password_hash)? {
        return Err(context.log_error(AppError::Validation(ValidationError::Invalid(
            "Invalid old password".to_string(),
        ))));
    }

    let password_hash = hash_password(&form.new_password, "new_password")?;
    users::update_password(pool.get_ref(), user_id, &password_hash).await?;

    tracing::info!(request_id = %context.request_id, user_id = %user_id, "Password changed");

    let body = ApiResponse::ok(serde_json::json!({}), "Password changed successfully");
    Ok(body
        .builder()
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE, app_settings.secure_cookies))
        .json(body))
}

/// PATCH /api/v1/users/update-account
///
/// Updates `fullname` and/or `email`; at least one must be given.
///
/// # Errors
/// - 400: Nothing to update, or an invalid value
/// - 409: Email already used by another account
pub async fn update_account(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    form: web::Json<UpdateAccountRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::for_request(&req, "update_account").with_user_id(user_id.to_string());

    let fullname = form
        .fullname
        .as_deref()
        .map(is_valid_name)
        .transpose()?;
    let email = form
        .email
        .as_deref()
        .map(is_valid_email)
        .transpose()?;

    if fullname.is_none() && email.is_none() {
        return Err(AppError::Validation(ValidationError::EmptyField(
            "fullname or email".to_string(),
        )));
    }

    let user = users::update_account(pool.get_ref(), user_id, fullname.as_deref(), email.as_deref()).await?;

    tracing::info!(request_id = %context.request_id, user_id = %user_id, "Account details updated");

    Ok(ApiResponse::ok(PublicUser::from(user), "Account details updated successfully").into_response())
}

/// PATCH /api/v1/users/avatar
pub async fn update_avatar(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    MultipartForm(form): MultipartForm<AvatarForm>,
    pool: web::Data<PgPool>,
    media: web::Data<MediaClient>,
    app_settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let file = require_image(form.avatar, ImageSlot::Avatar.field_name(), app_settings.max_upload_bytes)?;
    replace_image(&req, &claims, file, ImageSlot::Avatar, &pool, &media).await
}

/// PATCH /api/v1/users/cover-image
pub async fn update_cover_image(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    MultipartForm(form): MultipartForm<CoverImageForm>,
    pool: web::Data<PgPool>,
    media: web::Data<MediaClient>,
    app_settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let file = require_image(form.cover_image, ImageSlot::CoverImage.field_name(), app_settings.max_upload_bytes)?;
    replace_image(&req, &claims, file, ImageSlot::CoverImage, &pool, &media).await
}

/// Upload a new image into `slot`, then drop the asset it replaced
///
/// # Errors
/// - 502: Media host upload failed (the stored image is left untouched)
async fn replace_image(
    req: &HttpRequest,
    claims: &Claims,
    file: TempFile,
    slot: ImageSlot,
    pool: &PgPool,
    media: &MediaClient,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::for_request(req, format!("update_{}", slot.field_name()))
        .with_user_id(user_id.to_string());

    let current = users::get_by_id(pool, user_id).await?;
    let old_public_id = slot.current_public_id(&current).map(str::to_string);

    let uploaded = upload_image(media, file)
        .await
        .map_err(|e| context.log_error(e))?;

    let user = match users::update_image(pool, user_id, slot, &uploaded.url, &uploaded.public_id).await {
        Ok(user) => user,
        Err(e) => {
            discard_uploads(media, &[&uploaded]).await;
            return Err(e);
        }
    };
    discard_replaced(media, old_public_id, &uploaded.public_id).await;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        field = slot.field_name(),
        "Image updated"
    );

    let message = match slot {
        ImageSlot::Avatar => "Avatar updated successfully",
        ImageSlot::CoverImage => "Cover image updated successfully",
    };
    Ok(ApiResponse::ok(PublicUser::from(user), message).into_response())
}
