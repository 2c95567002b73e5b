//! 数据集统计与用户分析

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::auth::require_user;
use crate::state::AppState;
use medisearch_backend::dataset::DatasetStats;
use medisearch_backend::error::AppResult;

/// Per-user counts of persisted entities / 用户数据统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub saved_searches: i64,
    pub comparisons: i64,
    pub prescriptions: i64,
}

async fn count_for_user(pool: &SqlitePool, table: &str, user_id: &str) -> AppResult<i64> {
    // table 只来自下面的常量
    let sql = format!("SELECT COUNT(*) FROM {} WHERE user_id = ?", table);
    let n: i64 = sqlx::query_scalar(&sql).bind(user_id).fetch_one(pool).await?;
    Ok(n)
}

pub async fn user_stats(pool: &SqlitePool, user_id: &str) -> AppResult<UserStats> {
    Ok(UserStats {
        saved_searches: count_for_user(pool, "saved_searches", user_id).await?,
        comparisons: count_for_user(pool, "comparisons", user_id).await?,
        prescriptions: count_for_user(pool, "prescriptions", user_id).await?,
    })
}

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<DatasetStats> {
    Json(state.dataset.stats())
}

/// GET /api/v1/analytics - 需要登录
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;
    let user_stats = user_stats(&state.db, &user.id).await?;
    let stats = state.dataset.stats();

    let categories: Map<String, Value> = state
        .dataset
        .category_counts()
        .into_iter()
        .map(|(name, n)| (name, json!(n)))
        .collect();

    Ok(Json(json!({
        "user_stats": user_stats,
        "db_stats": {
            "total": stats.total_medicines,
            "active": stats.active_count,
            "discontinued": stats.discontinued_count,
            "manufacturers": stats.total_manufacturers,
        },
        "top_manufacturers": stats.top_manufacturers,
        "categories": categories,
    })))
}
