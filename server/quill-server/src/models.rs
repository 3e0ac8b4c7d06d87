//! Posts and domains
//!
//! Every row keeps the snap token of the latest authorization write that
//! touched it, so checks on the row observe that write.

use auth_permify::{EntityRef, Role, SnapToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub author_id: Uuid,
    pub domain_id: Option<Uuid>,
    #[serde(skip)]
    pub snap_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn entity(&self) -> EntityRef {
        EntityRef::post(&self.id.to_string())
    }

    pub fn snap_token(&self) -> Option<SnapToken> {
        self.snap_token.as_deref().map(SnapToken::new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Domain {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    #[serde(skip)]
    pub snap_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    pub fn entity(&self) -> EntityRef {
        EntityRef::domain(&self.id.to_string())
    }

    pub fn snap_token(&self) -> Option<SnapToken> {
        self.snap_token.as_deref().map(SnapToken::new)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Place the post in a domain the caller can view
    #[serde(default)]
    pub domain_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateDomainRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    /// `member` or `admin`
    #[serde(default = "default_member_role")]
    #[schema(value_type = String, example = "member")]
    pub role: Role,
}

fn default_member_role() -> Role {
    Role::Member
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionResponse {
    pub allowed: bool,
}
