//! Relationship-based authorization for Quill
//!
//! This crate wraps an external authorization engine (Permify) behind a
//! small, typed surface:
//! - Schema publishing, tenant-scoped, returning an immutable schema version
//! - Relationship writes returning a consistency (snap) token
//! - Permission checks pinned to a schema version and snap token
//! - An [`Authorizer`] facade combining the three for request handlers
//!
//! # Core Concepts
//!
//! - **Entity**: a principal (`user`) or a protected resource (`domain`, `post`)
//! - **Tuple**: "subject has relation on entity", e.g. `post:p1#admin@user:u1`
//! - **Snap token**: a point in the write history; checks carrying it see every earlier write
//!
//! # Example
//!
//! ```rust,no_run
//! use auth_permify::{Authorizer, AuthzConfig, EntityRef, Permission, PermifyClient, Role};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthzConfig::default();
//!     let engine = Arc::new(PermifyClient::new(&config.endpoint, config.api_key.clone()));
//!     let authz = Authorizer::provision(engine, &config).await?;
//!
//!     let alice = EntityRef::user("alice");
//!     let post = EntityRef::post("42");
//!     let token = authz.grant(&alice, &post, Role::Admin).await?;
//!
//!     let allowed = authz.authorize(&alice, &post, Permission::Edit, Some(&token)).await?;
//!     assert!(allowed);
//!     Ok(())
//! }
//! ```

pub mod checker;
pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod memory;
pub mod models;
pub mod permify;
pub mod publisher;
pub mod relationships;
pub mod schema;

pub use checker::{CheckParams, PermissionChecker, DEFAULT_DEPTH};
pub use config::{AuthzBackend, AuthzConfig};
pub use engine::{with_deadline, PermissionEngine, DEFAULT_DEADLINE};
pub use error::*;
pub use facade::Authorizer;
pub use memory::InMemoryEngine;
pub use models::*;
pub use permify::PermifyClient;
pub use publisher::SchemaPublisher;
pub use relationships::RelationshipWriter;
pub use schema::{SchemaDefinition, SchemaError, DEFAULT_SCHEMA};
