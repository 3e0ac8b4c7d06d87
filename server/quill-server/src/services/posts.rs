//! Post CRUD gated by the authorizer
//!
//! Creating a post makes the caller its `admin` and, when a domain is given,
//! links the post under that domain. Reads need `view`, writes need `edit`.

use crate::db::{DomainRepository, PostRepository};
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::models::{CreatePostRequest, Domain, Post, UpdatePostRequest};
use auth_permify::{Authorizer, Permission, Role, SnapToken};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    domains: Arc<dyn DomainRepository>,
    authorizer: Authorizer,
    list_check_concurrency: usize,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        domains: Arc<dyn DomainRepository>,
        authorizer: Authorizer,
        list_check_concurrency: usize,
    ) -> Self {
        Self {
            posts,
            domains,
            authorizer,
            list_check_concurrency: list_check_concurrency.max(1),
        }
    }

    /// Posts the caller can view. At most `list_check_concurrency` checks run
    /// at once, and one failed check fails the whole listing.
    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<Post>, ApiError> {
        let posts = self.posts.list().await?;
        let subject = ctx.subject();

        let checks: Vec<_> = posts
            .iter()
            .map(|post| {
                let subject = &subject;
                async move {
                    let token = post.snap_token();
                    self.authorizer
                        .authorize(subject, &post.entity(), Permission::View, token.as_ref())
                        .await
                }
            })
            .collect();
        let decisions: Vec<bool> = stream::iter(checks)
            .buffered(self.list_check_concurrency)
            .try_collect()
            .await?;

        Ok(posts
            .into_iter()
            .zip(decisions)
            .filter_map(|(post, allowed)| allowed.then_some(post))
            .collect())
    }

    pub async fn create(&self, ctx: &AuthContext, request: CreatePostRequest) -> Result<Post, ApiError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(ApiError::validation("title must not be empty"));
        }

        let domain = match request.domain_id {
            Some(domain_id) => {
                let domain = self
                    .domains
                    .find_by_id(domain_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found("domain"))?;
                let token = domain.snap_token();
                let allowed = self
                    .authorizer
                    .authorize(&ctx.subject(), &domain.entity(), Permission::View, token.as_ref())
                    .await?;
                if !allowed {
                    return Err(ApiError::authorization(format!(
                        "view permission required on domain {}",
                        domain.id
                    )));
                }
                Some(domain)
            }
            None => None,
        };

        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            title: title.to_string(),
            body: request.body,
            author_id: ctx.user_id,
            domain_id: domain.as_ref().map(|d| d.id),
            snap_token: None,
            created_at: now,
            updated_at: now,
        };
        let mut post = self.posts.create(&post).await?;

        let token = match self.write_relationships(ctx, &post, domain.as_ref()).await {
            Ok(token) => token,
            Err(err) => {
                warn!(post_id = %post.id, error = %err, "Relationship write failed, removing post");
                if let Err(cleanup) = self.posts.delete(post.id).await {
                    error!(post_id = %post.id, error = %cleanup, "Failed to remove unreachable post");
                }
                return Err(err.into());
            }
        };
        self.posts.set_snap_token(post.id, token.as_str()).await?;
        post.snap_token = Some(token.as_str().to_string());

        info!(post_id = %post.id, author_id = %ctx.user_id, domain_id = ?post.domain_id, "Post created");
        Ok(post)
    }

    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<Post, ApiError> {
        let post = self.find(id).await?;
        self.require(ctx, &post, Permission::View).await?;
        Ok(post)
    }

    pub async fn update(&self, ctx: &AuthContext, id: Uuid, request: UpdatePostRequest) -> Result<Post, ApiError> {
        let mut post = self.find(id).await?;
        self.require(ctx, &post, Permission::Edit).await?;

        if let Some(title) = request.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ApiError::validation("title must not be empty"));
            }
            post.title = title.to_string();
        }
        if let Some(body) = request.body {
            post.body = body;
        }
        post.updated_at = Utc::now();

        let updated = self
            .posts
            .update(&post)
            .await?
            .ok_or_else(|| ApiError::not_found("post"))?;
        info!(post_id = %updated.id, "Post updated");
        Ok(updated)
    }

    /// Relationships of the post stay in the authorization engine.
    pub async fn delete(&self, ctx: &AuthContext, id: Uuid) -> Result<(), ApiError> {
        let post = self.find(id).await?;
        self.require(ctx, &post, Permission::Edit).await?;

        if !self.posts.delete(id).await? {
            return Err(ApiError::not_found("post"));
        }
        info!(post_id = %id, "Post deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Post, ApiError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("post"))
    }

    async fn require(&self, ctx: &AuthContext, post: &Post, permission: Permission) -> Result<(), ApiError> {
        let token = post.snap_token();
        let allowed = self
            .authorizer
            .authorize(&ctx.subject(), &post.entity(), permission, token.as_ref())
            .await?;
        if allowed {
            Ok(())
        } else {
            Err(ApiError::authorization(format!(
                "{} permission required on post {}",
                permission, post.id
            )))
        }
    }

    /// The returned token covers every write made here
    async fn write_relationships(
        &self,
        ctx: &AuthContext,
        post: &Post,
        domain: Option<&Domain>,
    ) -> auth_permify::Result<SnapToken> {
        let mut token = self
            .authorizer
            .grant(&ctx.subject(), &post.entity(), Role::Admin)
            .await?;
        if let Some(domain) = domain {
            token = self.authorizer.link_parent(&post.entity(), &domain.entity()).await?;
        }
        Ok(token)
    }
}
