use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use chrono::Utc;

use crate::state::AppState;
use crate::auth::create_session;
use medisearch_backend::error::{AppError, AppResult};
use medisearch_backend::models::UserInfo;
use super::types::*;

pub const MIN_PASSWORD_LEN: usize = 6;

fn validate(req: &RegisterRequest) -> AppResult<()> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Username, email, and password are required"));
    }
    if let Some(confirm) = &req.confirm_password {
        if *confirm != req.password {
            return Err(AppError::validation("Passwords do not match"));
        }
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    validate(&req)?;

    let username = req.username.trim();
    let email = req.email.trim();

    // 检查用户名是否已存在
    let existing_user: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM users WHERE username = ?"
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await?;

    if existing_user.is_some() {
        return Err(AppError::validation("Username already exists"));
    }

    // 检查邮箱是否已存在
    let existing_email: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM users WHERE email = ?"
    )
    .bind(email)
    .fetch_optional(&state.db)
    .await?;

    if existing_email.is_some() {
        return Err(AppError::validation("Email already registered"));
    }

    let password_hash = bcrypt::hash(&req.password, state.config.auth.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("bcrypt hash failed: {}", e)))?;

    let user_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    // 用户与会话在同一事务中创建
    let mut tx = state.db.begin().await?;
    sqlx::query(
        "INSERT INTO users (id, username, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)"
    )
    .bind(&user_id)
    .bind(username)
    .bind(email)
    .bind(&password_hash)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    let token = create_session(&mut tx, &user_id, state.config.auth.session_ttl_hours).await?;
    tx.commit().await?;

    tracing::info!("Registered user {}", username);

    Ok((StatusCode::CREATED, Json(TokenResponse {
        token,
        user: UserInfo {
            id: user_id,
            username: username.to_string(),
            email: email.to_string(),
            created_at: now,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(username: &str, email: &str, password: &str, confirm: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm.map(str::to_string),
        }
    }

    #[test]
    fn test_validate() {
        assert!(validate(&req("amy", "amy@example.com", "secret1", None)).is_ok());
        assert!(validate(&req("amy", "amy@example.com", "secret1", Some("secret1"))).is_ok());
        assert!(validate(&req("", "amy@example.com", "secret1", None)).is_err());
        assert!(validate(&req("amy", "amy@example.com", "short", None)).is_err());
        assert!(validate(&req("amy", "amy@example.com", "secret1", Some("secret2"))).is_err());
    }
}
