pub mod domains;
pub mod posts;

pub use domains::{DomainService, Membership};
pub use posts::PostService;
