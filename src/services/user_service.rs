use sqlx::{FromRow, PgPool};

use crate::dto::admin_dto::{AdminCheck, ProgressStatus, UserOverview};
use crate::error::{Error, Result};
use crate::models::user::User;
use crate::utils::crypto::{hash_password, verify_password};

#[derive(FromRow)]
struct UserOverviewRow {
    id: i64,
    username: String,
    session_id: Option<i64>,
    is_completed: Option<bool>,
    test_id: Option<i64>,
    test_title: Option<String>,
}

impl From<UserOverviewRow> for UserOverview {
    fn from(row: UserOverviewRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            status: ProgressStatus::from_session(row.session_id, row.is_completed),
            session_id: row.session_id,
            test_id: row.test_id,
            test_title: row.test_title,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, is_active, is_admin, created_at
            FROM users WHERE username = $1
            "#,
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Checks credentials and returns the user on success.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .find_by_username(username)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        if !verify_password(password, user.password_hash.as_deref()) {
            tracing::warn!(user_id = user.id, "login rejected: wrong password");
            return Err(Error::Unauthorized("Incorrect password".to_string()));
        }
        if !user.is_active {
            return Err(Error::BadRequest("User is inactive".to_string()));
        }

        tracing::info!(user_id = user.id, is_admin = user.is_admin, "user logged in");
        Ok(user)
    }

    pub async fn check_admin(&self, user_id: i64) -> Result<AdminCheck> {
        let (is_admin, username) = sqlx::query_as::<_, (bool, String)>(
            r#"SELECT is_admin, username FROM users WHERE id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        Ok(AdminCheck { is_admin, username })
    }

    /// Active non-admin users with one row per session they hold.
    pub async fn list_users(&self) -> Result<Vec<UserOverview>> {
        let rows = sqlx::query_as::<_, UserOverviewRow>(
            r#"
            SELECT u.id, u.username,
                   s.id AS session_id, s.is_completed, s.test_id,
                   t.title AS test_title
            FROM users u
            LEFT JOIN test_sessions s ON s.user_id = u.id
            LEFT JOIN tests t ON t.id = s.test_id
            WHERE u.is_active AND NOT u.is_admin
            ORDER BY u.id, s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(UserOverview::from).collect())
    }

    /// Creates the account or resets its password and flags.
    pub async fn upsert_user(&self, username: &str, password: &str, is_admin: bool) -> Result<i64> {
        let password_hash = hash_password(password)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (username, password_hash, is_active, is_admin)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (username) DO UPDATE
            SET password_hash = EXCLUDED.password_hash,
                is_active = TRUE,
                is_admin = EXCLUDED.is_admin
            RETURNING id
            "#,
        )
        .bind(username.trim())
        .bind(password_hash)
        .bind(is_admin)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(user_id = id, is_admin, "user upserted");
        Ok(id)
    }
}
