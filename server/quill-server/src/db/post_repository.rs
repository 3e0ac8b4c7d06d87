use super::{DbResult, PostRepository};
use crate::models::Post;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const POST_COLUMNS: &str = "id, title, body, author_id, domain_id, snap_token, created_at, updated_at";

pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: &Post) -> DbResult<Post> {
        debug!(post_id = %post.id, "Inserting post");

        let query = format!(
            r#"
            INSERT INTO posts (id, title, body, author_id, domain_id, snap_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.author_id)
            .bind(post.domain_id)
            .bind(&post.snap_token)
            .bind(post.created_at)
            .bind(post.updated_at)
            .fetch_one(&self.pool)
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Post>> {
        let query = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list(&self) -> DbResult<Vec<Post>> {
        let query = format!("SELECT {} FROM posts ORDER BY created_at DESC", POST_COLUMNS);
        sqlx::query_as::<_, Post>(&query).fetch_all(&self.pool).await
    }

    async fn update(&self, post: &Post) -> DbResult<Option<Post>> {
        let query = format!(
            r#"
            UPDATE posts
            SET title = $2, body = $3, updated_at = $4
            WHERE id = $1
            RETURNING {}
            "#,
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.updated_at)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_snap_token(&self, id: Uuid, snap_token: &str) -> DbResult<()> {
        sqlx::query("UPDATE posts SET snap_token = $2 WHERE id = $1")
            .bind(id)
            .bind(snap_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
