use crate::{error::*, models::*};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

pub mod postgres;

pub use postgres::PostgresUserRepository;

/// Storage for user accounts. Emails are stored lowercased and unique.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; `EmailAlreadyInUse` if the email is taken
    async fn create_user(&self, user: &User) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_oidc_subject(&self, subject: &str) -> Result<Option<User>>;
    /// Replace name, password hash and OIDC subject of an existing user
    async fn update_user(&self, user: &User) -> Result<User>;
}

/// In-memory user repository for testing and development
pub struct InMemoryUserRepository {
    users: Arc<DashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(DashMap::new()),
        }
    }

    fn find(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, user: &User) -> Result<User> {
        if self.find(|u| u.email == user.email).is_some() {
            return Err(IdentityError::EmailAlreadyInUse);
        }
        if let Some(ref subject) = user.oidc_subject {
            if self.find(|u| u.oidc_subject.as_ref() == Some(subject)).is_some() {
                return Err(IdentityError::SubjectAlreadyLinked);
            }
        }
        self.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find(|u| u.email == email))
    }

    async fn find_by_oidc_subject(&self, subject: &str) -> Result<Option<User>> {
        Ok(self.find(|u| u.oidc_subject.as_deref() == Some(subject)))
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        if let Some(ref subject) = user.oidc_subject {
            if self
                .find(|u| u.id != user.id && u.oidc_subject.as_ref() == Some(subject))
                .is_some()
            {
                return Err(IdentityError::SubjectAlreadyLinked);
            }
        }
        let mut stored = self.users.get_mut(&user.id).ok_or(IdentityError::UserNotFound)?;
        stored.name = user.name.clone();
        stored.password_hash = user.password_hash.clone();
        stored.oidc_subject = user.oidc_subject.clone();
        stored.updated_at = user.updated_at;
        Ok(stored.clone())
    }
}
