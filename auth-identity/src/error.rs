use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailAlreadyInUse,

    #[error("OIDC subject already linked to another user")]
    SubjectAlreadyLinked,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Identity provider returned incomplete claims: {0}")]
    IncompleteClaims(String),

    #[error("Identity provider has not verified this email, so it cannot be linked to an existing account")]
    UnverifiedEmail,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Hashing error")]
    HashingError,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
