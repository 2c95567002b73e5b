use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::medicines::resolve_indices;
use crate::auth::require_user;
use crate::state::AppState;
use medisearch_backend::error::{AppError, AppResult};
use medisearch_backend::models::{join_indices, parse_indices, Comparison, ComparisonRow, UNTITLED_COMPARISON};

/// Indices may arrive as a JSON array or as "1,2,3" / 索引可为数组或逗号分隔字符串
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IndicesInput {
    List(Vec<i64>),
    Text(String),
}

impl IndicesInput {
    pub fn into_indices(self) -> AppResult<Vec<i64>> {
        match self {
            IndicesInput::List(v) => Ok(v),
            IndicesInput::Text(s) => parse_indices(&s).map_err(AppError::Validation),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateComparisonRequest {
    pub medicine_indices: Option<IndicesInput>,
    pub title: Option<String>,
}

/// GET /api/v1/comparisons
pub async fn list_comparisons(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;

    let rows = sqlx::query_as::<_, ComparisonRow>(
        "SELECT * FROM comparisons WHERE user_id = ? ORDER BY created_at DESC, id DESC"
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    let comparisons: Vec<Comparison> = rows.into_iter().map(Comparison::from).collect();
    Ok(Json(json!({ "comparisons": comparisons })))
}

/// POST /api/v1/comparisons - 保存药品对比
pub async fn create_comparison(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateComparisonRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user = require_user(&state, &headers).await?;

    let indices = match req.medicine_indices {
        Some(input) => input.into_indices()?,
        None => Vec::new(),
    };
    if indices.is_empty() {
        return Err(AppError::validation("Medicine indices are required"));
    }
    resolve_indices(&state.dataset, &indices)?;

    let title = req
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_COMPARISON.to_string());
    let now = Utc::now().to_rfc3339();

    let id = sqlx::query(
        "INSERT INTO comparisons (user_id, medicine_indices, title, created_at) VALUES (?, ?, ?, ?)"
    )
    .bind(&user.id)
    .bind(join_indices(&indices))
    .bind(&title)
    .bind(&now)
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    let comparison = Comparison {
        id,
        medicine_indices: indices,
        title,
        created_at: now,
    };
    Ok((StatusCode::CREATED, Json(json!({ "comparison": comparison }))))
}

/// DELETE /api/v1/comparisons/:id
pub async fn delete_comparison(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;

    let affected = sqlx::query("DELETE FROM comparisons WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(&user.id)
        .execute(&state.db)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(AppError::not_found("Comparison not found"));
    }

    Ok(Json(json!({ "message": "Comparison deleted" })))
}
