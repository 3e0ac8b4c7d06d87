//! PostgreSQL-backed user repository
//!
//! Expects the `users` table created by the server's migrations, with unique
//! indexes on `email` and `oidc_subject`.

use crate::{
    error::{IdentityError, Result},
    models::User,
    repository::UserRepository,
};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, password_hash, oidc_subject, created_at, updated_at";

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unique violations become the matching domain error
fn map_write_error(err: sqlx::Error) -> IdentityError {
    if let sqlx::Error::Database(ref db) = err {
        if db.is_unique_violation() {
            return match db.constraint() {
                Some(c) if c.contains("oidc_subject") => IdentityError::SubjectAlreadyLinked,
                _ => IdentityError::EmailAlreadyInUse,
            };
        }
    }
    IdentityError::DatabaseError(err)
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, user: &User) -> Result<User> {
        debug!(user_id = %user.id, "Inserting user");

        let query = format!(
            r#"
            INSERT INTO users (id, email, name, password_hash, oidc_subject, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(&user.oidc_subject)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_oidc_subject(&self, subject: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE oidc_subject = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(subject)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let query = format!(
            r#"
            UPDATE users
            SET name = $2, password_hash = $3, oidc_subject = $4, updated_at = $5
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(&user.oidc_subject)
            .bind(user.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .ok_or(IdentityError::UserNotFound)
    }
}
