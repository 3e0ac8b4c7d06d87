use thiserror::Error;

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider discovery failed: {0}")]
    Discovery(String),

    #[error("Invalid or expired state parameter")]
    InvalidState,

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Userinfo request failed: {0}")]
    UserInfo(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OAuthError>;
