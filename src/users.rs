/// User records and the queries over the `users` table

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError};

/// Full `users` row, including secrets. Never serialize this directly.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub avatar_public_id: Option<String>,
    pub cover_image: String,
    pub cover_image_public_id: Option<String>,
    pub password_hash: String,
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What clients get to see of a user
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            avatar: user.avatar,
            cover_image: user.cover_image,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Validated input for a new user
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub password_hash: String,
    pub avatar: String,
    pub avatar_public_id: Option<String>,
    pub cover_image: String,
    pub cover_image_public_id: Option<String>,
}

/// Which image slot a media upload goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Avatar,
    CoverImage,
}

impl ImageSlot {
    /// Multipart field name clients upload under
    pub fn field_name(&self) -> &'static str {
        match self {
            ImageSlot::Avatar => "avatar",
            ImageSlot::CoverImage => "coverImage",
        }
    }

    /// Public id of the asset currently stored in this slot
    pub fn current_public_id<'a>(&self, user: &'a User) -> Option<&'a str> {
        match self {
            ImageSlot::Avatar => user.avatar_public_id.as_deref(),
            ImageSlot::CoverImage => user.cover_image_public_id.as_deref(),
        }
    }
}

fn user_not_found() -> AppError {
    AppError::Database(DatabaseError::NotFound("User not found".to_string()))
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Like [`find_by_id`], but a missing user is a `NotFound` error
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
    find_by_id(pool, id).await?.ok_or_else(user_not_found)
}

/// Look a user up by email, or by username when no email is given
pub async fn find_by_login(
    pool: &PgPool,
    email: Option<&str>,
    username: Option<&str>,
) -> Result<Option<User>, AppError> {
    let (query, value) = match (email, username) {
        (Some(email), _) => ("SELECT * FROM users WHERE email = $1", email),
        (None, Some(username)) => ("SELECT * FROM users WHERE username = $1", username),
        (None, None) => return Ok(None),
    };

    let user = sqlx::query_as::<_, User>(query)
        .bind(value)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn exists_with_email_or_username(
    pool: &PgPool,
    email: &str,
    username: &str,
) -> Result<bool, AppError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR username = $2)",
    )
    .bind(email)
    .bind(username)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

pub async fn insert(pool: &PgPool, new_user: NewUser) -> Result<User, AppError> {
    let now = Utc::now();
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            id, username, email, fullname, avatar, avatar_public_id,
            cover_image, cover_image_public_id, password_hash, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.fullname)
    .bind(&new_user.avatar)
    .bind(&new_user.avatar_public_id)
    .bind(&new_user.cover_image)
    .bind(&new_user.cover_image_public_id)
    .bind(&new_user.password_hash)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(user)
}

/// Store a new password hash and drop the stored refresh token
pub async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $1, refresh_token_hash = NULL, updated_at = now()
        WHERE id = $2
        "#,
    )
    .bind(password_hash)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(user_not_found());
    }
    Ok(())
}

/// Update the profile fields that are `Some`, keep the rest
pub async fn update_account(
    pool: &PgPool,
    id: Uuid,
    fullname: Option<&str>,
    email: Option<&str>,
) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET fullname = COALESCE($1, fullname),
            email = COALESCE($2, email),
            updated_at = now()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(fullname)
    .bind(email)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(user_not_found)
}

pub async fn update_image(
    pool: &PgPool,
    id: Uuid,
    slot: ImageSlot,
    url: &str,
    public_id: &str,
) -> Result<User, AppError> {
    let query = match slot {
        ImageSlot::Avatar => {
            r#"
            UPDATE users
            SET avatar = $1, avatar_public_id = $2, updated_at = now()
            WHERE id = $3
            RETURNING *
            "#
        }
        ImageSlot::CoverImage => {
            r#"
            UPDATE users
            SET cover_image = $1, cover_image_public_id = $2, updated_at = now()
            WHERE id = $3
            RETURNING *
            "#
        }
    };

    sqlx::query_as::<_, User>(query)
        .bind(url)
        .bind(public_id)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(user_not_found)
}

#[cfg(test)]
pub(crate) fn test_user() -> User {
    User {
        id: Uuid::new_v4(),
        username: "tester".to_string(),
        email: "test@example.com".to_string(),
        fullname: "Test User".to_string(),
        avatar: "https://media.example.com/avatar.png".to_string(),
        avatar_public_id: Some("avatar".to_string()),
        cover_image: String::new(),
        cover_image_public_id: None,
        password_hash: "$2b$12$hash".to_string(),
        refresh_token_hash: Some("refresh-hash".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_user_hides_secrets() {
        let public: PublicUser = test_user().into();
        let json = serde_json::to_value(&public).unwrap();

        assert!(json.get("password_hash").is_none());
        assert!(json.get("refresh_token_hash").is_none());
        assert!(json.get("avatar_public_id").is_none());
        assert_eq!(json["username"], "tester");
        assert_eq!(json["cover_image"], "");
    }

    #[test]
    fn test_image_slot_public_ids() {
        let user = test_user();
        assert_eq!(ImageSlot::Avatar.current_public_id(&user), Some("avatar"));
        assert_eq!(ImageSlot::CoverImage.current_public_id(&user), None);
        assert_eq!(ImageSlot::CoverImage.field_name(), "coverImage");
    }
}
