use super::{DbResult, DomainRepository};
use crate::models::Domain;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const DOMAIN_COLUMNS: &str = "id, name, owner_id, snap_token, created_at, updated_at";

pub struct PostgresDomainRepository {
    pool: PgPool,
}

impl PostgresDomainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DomainRepository for PostgresDomainRepository {
    async fn create(&self, domain: &Domain) -> DbResult<Domain> {
        debug!(domain_id = %domain.id, "Inserting domain");

        let query = format!(
            r#"
            INSERT INTO domains (id, name, owner_id, snap_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            DOMAIN_COLUMNS
        );
        sqlx::query_as::<_, Domain>(&query)
            .bind(domain.id)
            .bind(&domain.name)
            .bind(domain.owner_id)
            .bind(&domain.snap_token)
            .bind(domain.created_at)
            .bind(domain.updated_at)
            .fetch_one(&self.pool)
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Domain>> {
        let query = format!("SELECT {} FROM domains WHERE id = $1", DOMAIN_COLUMNS);
        sqlx::query_as::<_, Domain>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn set_snap_token(&self, id: Uuid, snap_token: &str) -> DbResult<()> {
        sqlx::query("UPDATE domains SET snap_token = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(snap_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM domains WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
