use axum::http::{header, HeaderMap};
use rand::Rng;
use sqlx::SqliteConnection;
use chrono::Utc;

use crate::state::AppState;
use medisearch_backend::error::{AppError, AppResult};
use medisearch_backend::models::User;

pub const SESSION_COOKIE_NAME: &str = "session_token";

const TOKEN_LEN: usize = 64;

// 从Cookie中提取session token
fn token_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers.get(header::COOKIE)
        .and_then(|cookie_header| cookie_header.to_str().ok())
        .and_then(|cookie_str| {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some((key, value)) = cookie.split_once('=') {
                    if key.trim() == SESSION_COOKIE_NAME {
                        return Some(value.trim().to_string());
                    }
                }
            }
            None
        })
}

/// Session token from `Authorization: Bearer` or the session cookie / 提取会话令牌
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers.get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| token_from_cookie(headers)).filter(|t| !t.is_empty())
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Create a session for `user_id`, returns the token / 创建会话
pub async fn create_session(conn: &mut SqliteConnection, user_id: &str, ttl_hours: i64) -> AppResult<String> {
    let token = generate_token();
    let expires_at = Utc::now().timestamp() + ttl_hours * 60 * 60;

    sqlx::query(
        "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)"
    )
    .bind(&token)
    .bind(user_id)
    .bind(expires_at)
    .bind(Utc::now().to_rfc3339())
    .execute(conn)
    .await?;

    Ok(token)
}

// 删除session（登出）
pub async fn delete_session(state: &AppState, token: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(token)
        .execute(&state.db)
        .await?;
    Ok(())
}

/// Resolve the authenticated user, or `AppError::Auth` / 获取当前登录用户
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> AppResult<User> {
    let token = extract_session_token(headers)
        .ok_or_else(|| AppError::auth("Authentication required"))?;

    let session: Option<(String, i64)> = sqlx::query_as(
        "SELECT user_id, expires_at FROM sessions WHERE id = ?"
    )
    .bind(&token)
    .fetch_optional(&state.db)
    .await?;

    let (user_id, expires_at) = session.ok_or_else(|| AppError::auth("Invalid token"))?;

    if expires_at <= Utc::now().timestamp() {
        if let Err(e) = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(&token)
            .execute(&state.db)
            .await
        {
            tracing::warn!("Failed to remove expired session: {}", e);
        }
        return Err(AppError::auth("Token has expired"));
    }

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::auth("Invalid token"))
}

/// Like [`require_user`] but anonymous requests yield `None` / 可选登录
pub async fn optional_user(state: &AppState, headers: &HeaderMap) -> AppResult<Option<User>> {
    if extract_session_token(headers).is_none() {
        return Ok(None);
    }
    match require_user(state, headers).await {
        Ok(user) => Ok(Some(user)),
        Err(AppError::Auth(msg)) => {
            tracing::debug!("Ignoring invalid session on optional-auth route: {}", msg);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
