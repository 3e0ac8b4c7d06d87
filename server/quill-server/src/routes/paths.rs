//! Route paths, grouped by area

pub mod health {
    pub const HEALTH: &str = "/health";
}

pub mod auth {
    pub const REGISTER: &str = "/auth/register";
    pub const LOGIN: &str = "/auth/login";
    pub const REFRESH: &str = "/auth/refresh";
    pub const LOGOUT: &str = "/auth/logout";
    pub const OIDC_LOGIN: &str = "/auth/oidc/login";
    pub const OIDC_CALLBACK: &str = "/auth/oidc/callback";
}

pub mod posts {
    pub const POSTS: &str = "/posts";
    pub const POST_BY_ID: &str = "/posts/:id";
}

pub mod domains {
    pub const DOMAINS: &str = "/domains";
    pub const MEMBERS: &str = "/domains/:id/members";
    pub const PERMISSION: &str = "/domains/:id/permissions/:permission";
}
