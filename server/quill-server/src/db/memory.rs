use super::{DbResult, DomainRepository, PostRepository};
use crate::models::{Domain, Post};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: Arc<DashMap<Uuid, Post>>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, post: &Post) -> DbResult<Post> {
        self.posts.insert(post.id, post.clone());
        Ok(post.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Post>> {
        Ok(self.posts.get(&id).map(|p| p.clone()))
    }

    async fn list(&self) -> DbResult<Vec<Post>> {
        let mut posts: Vec<Post> = self.posts.iter().map(|entry| entry.value().clone()).collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn update(&self, post: &Post) -> DbResult<Option<Post>> {
        Ok(self.posts.get_mut(&post.id).map(|mut stored| {
            stored.title = post.title.clone();
            stored.body = post.body.clone();
            stored.updated_at = post.updated_at;
            stored.clone()
        }))
    }

    async fn set_snap_token(&self, id: Uuid, snap_token: &str) -> DbResult<()> {
        if let Some(mut stored) = self.posts.get_mut(&id) {
            stored.snap_token = Some(snap_token.to_string());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        Ok(self.posts.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryDomainRepository {
    domains: Arc<DashMap<Uuid, Domain>>,
}

impl InMemoryDomainRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DomainRepository for InMemoryDomainRepository {
    async fn create(&self, domain: &Domain) -> DbResult<Domain> {
        self.domains.insert(domain.id, domain.clone());
        Ok(domain.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<Domain>> {
        Ok(self.domains.get(&id).map(|d| d.clone()))
    }

    async fn set_snap_token(&self, id: Uuid, snap_token: &str) -> DbResult<()> {
        if let Some(mut stored) = self.domains.get_mut(&id) {
            stored.snap_token = Some(snap_token.to_string());
            stored.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        Ok(self.domains.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn post(title: &str, age_minutes: i64) -> Post {
        let created_at = Utc::now() - Duration::minutes(age_minutes);
        Post {
            id: Uuid::new_v4(),
            title: title.to_string(),
            body: String::new(),
            author_id: Uuid::new_v4(),
            domain_id: None,
            snap_token: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = InMemoryPostRepository::new();
        repo.create(&post("old", 10)).await.unwrap();
        repo.create(&post("new", 1)).await.unwrap();

        let titles: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["new".to_string(), "old".to_string()]);
    }

    #[tokio::test]
    async fn test_update_keeps_author_and_token() {
        let repo = InMemoryPostRepository::new();
        let mut stored = repo.create(&post("draft", 0)).await.unwrap();
        repo.set_snap_token(stored.id, "tok-1").await.unwrap();

        stored.title = "final".to_string();
        stored.author_id = Uuid::new_v4();
        let updated = repo.update(&stored).await.unwrap().unwrap();
        assert_eq!(updated.title, "final");
        assert_ne!(updated.author_id, stored.author_id);
        assert_eq!(updated.snap_token.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let repo = InMemoryPostRepository::new();
        assert!(repo.update(&post("ghost", 0)).await.unwrap().is_none());
        assert!(!repo.delete(Uuid::new_v4()).await.unwrap());
    }
}
