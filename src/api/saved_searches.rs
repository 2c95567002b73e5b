use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::require_user;
use crate::state::AppState;
use medisearch_backend::error::{AppError, AppResult};
use medisearch_backend::models::{SavedSearch, SavedSearchRow, SearchFilters};
use medisearch_backend::search::{self, SearchQuery, StatusFilter};

#[derive(Debug, Deserialize)]
pub struct CreateSavedSearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Option<SearchFilters>,
}

async fn find_owned(state: &AppState, id: i64, user_id: &str) -> AppResult<SavedSearchRow> {
    sqlx::query_as::<_, SavedSearchRow>(
        "SELECT * FROM saved_searches WHERE id = ? AND user_id = ?"
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Saved search not found"))
}

/// GET /api/v1/saved-searches - 当前用户的保存搜索，最新在前
pub async fn list_saved_searches(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;

    let rows = sqlx::query_as::<_, SavedSearchRow>(
        "SELECT * FROM saved_searches WHERE user_id = ? ORDER BY created_at DESC, id DESC"
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    let saved: Vec<SavedSearch> = rows.into_iter().map(SavedSearch::from).collect();
    Ok(Json(json!({ "saved_searches": saved })))
}

/// POST /api/v1/saved-searches
pub async fn create_saved_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSavedSearchRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user = require_user(&state, &headers).await?;

    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::validation("Query is required"));
    }

    let filters = req.filters.unwrap_or_default();
    filters
        .discontinued
        .parse::<StatusFilter>()
        .map_err(AppError::Validation)?;

    let filters_json = serde_json::to_string(&filters)
        .map_err(|e| AppError::Internal(format!("serialize filters: {}", e)))?;
    let now = Utc::now().to_rfc3339();

    let id = sqlx::query(
        "INSERT INTO saved_searches (user_id, query, filters, created_at) VALUES (?, ?, ?, ?)"
    )
    .bind(&user.id)
    .bind(query)
    .bind(&filters_json)
    .bind(&now)
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    tracing::debug!("User {} saved search {:?} as #{}", user.username, query, id);

    let saved = SavedSearch {
        id,
        query: query.to_string(),
        filters,
        created_at: now,
    };
    Ok((StatusCode::CREATED, Json(json!({ "saved_search": saved }))))
}

/// DELETE /api/v1/saved-searches/:id
pub async fn delete_saved_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;

    // 其他用户的记录同样返回 404
    let affected = sqlx::query("DELETE FROM saved_searches WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(&user.id)
        .execute(&state.db)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(AppError::not_found("Saved search not found"));
    }

    Ok(Json(json!({ "message": "Saved search deleted" })))
}

/// GET /api/v1/saved-searches/:id/results - re-run a saved search / 重新执行保存的搜索
pub async fn run_saved_search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let saved = SavedSearch::from(find_owned(&state, id, &user.id).await?);

    // 旧记录中无法识别的状态按 all 处理
    let status: StatusFilter = saved.filters.discontinued.parse().unwrap_or_default();
    let query = SearchQuery::new(saved.query.clone())
        .with_manufacturer(saved.filters.manufacturer.clone())
        .with_status(status);

    let medicines = search::search(&state.dataset, &query);

    Ok(Json(json!({
        "saved_search": saved,
        "count": medicines.len(),
        "medicines": medicines,
    })))
}
