use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;
use crate::auth::require_user;
use medisearch_backend::error::AppResult;
use medisearch_backend::models::UserInfo;

/// GET /api/v1/auth/me - 获取当前用户信息
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let last_login = user.last_login.clone();

    Ok(Json(json!({
        "user": UserInfo::from(user),
        "last_login": last_login,
    })))
}
