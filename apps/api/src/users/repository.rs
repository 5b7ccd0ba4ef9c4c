use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::user::UserRow;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub uid: String,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub img: Option<String>,
}

/// Already-validated profile changes; `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub img: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.full_name.is_none()
            && self.img.is_none()
            && self.address.is_none()
            && self.phone.is_none()
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserRow>, AppError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>, AppError>;
    /// Fails with `Conflict` when the uid, username or email already exists.
    async fn create(&self, user: NewUser) -> Result<UserRow, AppError>;
    /// Fails with `Conflict` when the new username is taken.
    async fn update_profile(
        &self,
        uid: &str,
        changes: ProfileChanges,
    ) -> Result<Option<UserRow>, AppError>;
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserRow>, AppError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>, AppError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<UserRow, AppError> {
        sqlx::query_as(
            r#"
            INSERT INTO users (uid, username, email, full_name, img)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&user.uid)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.img)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "User already exists"))
    }

    async fn update_profile(
        &self,
        uid: &str,
        changes: ProfileChanges,
    ) -> Result<Option<UserRow>, AppError> {
        sqlx::query_as(
            r#"
            UPDATE users
            SET username   = COALESCE($2, username),
                full_name  = COALESCE($3, full_name),
                img        = COALESCE($4, img),
                address    = COALESCE($5, address),
                phone      = COALESCE($6, phone),
                updated_at = NOW()
            WHERE uid = $1
            RETURNING *
            "#,
        )
        .bind(uid)
        .bind(&changes.username)
        .bind(&changes.full_name)
        .bind(&changes.img)
        .bind(&changes.address)
        .bind(&changes.phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Username is unavailable"))
    }
}
