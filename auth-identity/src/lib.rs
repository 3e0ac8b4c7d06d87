//! Identity management and user authentication for Quill
//!
//! This module provides:
//! - User registration with argon2 password hashing
//! - Password authentication
//! - Mapping OIDC logins onto local accounts (by subject, then by email)
//! - User repositories backed by PostgreSQL or memory
//!
//! # Example
//!
//! ```rust
//! use auth_identity::{IdentityConfig, IdentityService, InMemoryUserRepository, RegisterRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = IdentityService::new(Arc::new(InMemoryUserRepository::new()), IdentityConfig::default());
//!
//!     service.register(RegisterRequest {
//!         email: "user@example.com".to_string(),
//!         name: "User".to_string(),
//!         password: "password123".to_string(),
//!     }).await?;
//!     let user = service.authenticate("user@example.com", "password123").await?;
//!     assert_eq!(user.name, "User");
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;

pub use config::*;
pub use error::*;
pub use models::*;
pub use repository::{InMemoryUserRepository, PostgresUserRepository, UserRepository};
pub use service::*;
