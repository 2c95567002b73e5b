use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::{Cookies, Cookie};
use chrono::Utc;

use crate::state::AppState;
use crate::auth::{SESSION_COOKIE_NAME, create_session, delete_session, extract_session_token};
use medisearch_backend::error::{AppError, AppResult};
use medisearch_backend::models::User;
use super::types::*;

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Username and password are required"));
    }

    // 检查用户是否被锁定
    if state.login_security.is_blocked(username) {
        tracing::warn!("Login blocked for {}", username);
        return Err(AppError::TooManyAttempts(
            "Too many failed login attempts, try again in 30 minutes".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(&state.db)
        .await?;

    let user = match user {
        Some(u) => u,
        None => {
            state.login_security.record_failure(username);
            return Err(AppError::auth("Invalid credentials"));
        }
    };

    let valid = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::Internal(format!("bcrypt verify failed: {}", e)))?;

    if !valid {
        state.login_security.record_failure(username);
        return Err(AppError::auth("Invalid credentials"));
    }

    // 登录成功，清除失败记录
    state.login_security.clear_failure(username);

    let mut tx = state.db.begin().await?;
    let token = create_session(&mut tx, &user.id, state.config.auth.session_ttl_hours).await?;
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);

    tracing::info!("User {} logged in", user.username);

    Ok(Json(TokenResponse {
        token,
        user: user.into(),
    }))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    cookies: Cookies,
) -> AppResult<Json<Value>> {
    if let Some(token) = extract_session_token(&headers) {
        delete_session(&state, &token).await?;
    }

    // 必须设置相同的 path 才能正确删除 cookie
    let mut removal_cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    removal_cookie.set_path("/");
    cookies.remove(removal_cookie);

    Ok(Json(json!({"message": "Logged out"})))
}
