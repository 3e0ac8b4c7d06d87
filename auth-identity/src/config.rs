use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    #[serde(default = "default_password_max_length")]
    pub password_max_length: usize,
    #[serde(default)]
    pub password_require_numbers: bool,
}

fn default_password_min_length() -> usize {
    8
}

fn default_password_max_length() -> usize {
    128
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            password_min_length: default_password_min_length(),
            password_max_length: default_password_max_length(),
            password_require_numbers: false,
        }
    }
}
