//! Persistence for posts and domains
//!
//! Postgres implementations use runtime-checked queries against the tables
//! created by `migrations/`. The in-memory implementations back the
//! `memory` database backend and the tests.

use crate::models::{Domain, Post};
use async_trait::async_trait;
use uuid::Uuid;

pub mod domain_repository;
pub mod memory;
pub mod post_repository;

pub use domain_repository::PostgresDomainRepository;
pub use memory::{InMemoryDomainRepository, InMemoryPostRepository};
pub use post_repository::PostgresPostRepository;

pub type DbResult<T> = Result<T, sqlx::Error>;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &Post) -> DbResult<Post>;
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Post>>;
    /// Every post, newest first; callers filter by permission
    async fn list(&self) -> DbResult<Vec<Post>>;
    /// Replace title and body; `None` when the post is gone
    async fn update(&self, post: &Post) -> DbResult<Option<Post>>;
    async fn set_snap_token(&self, id: Uuid, snap_token: &str) -> DbResult<()>;
    /// `false` when nothing was deleted
    async fn delete(&self, id: Uuid) -> DbResult<bool>;
}

#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn create(&self, domain: &Domain) -> DbResult<Domain>;
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Domain>>;
    async fn set_snap_token(&self, id: Uuid, snap_token: &str) -> DbResult<()>;
    async fn delete(&self, id: Uuid) -> DbResult<bool>;
}
