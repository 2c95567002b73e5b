use serde::{Deserialize, Serialize};

use medisearch_backend::models::UserInfo;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub confirm_password: Option<String>,
}

/// Returned by login and register / 登录注册返回
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserInfo,
}
