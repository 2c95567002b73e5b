use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;
use medisearch_backend::dataset::{Dataset, MedicineRecord};
use medisearch_backend::error::{AppError, AppResult};
use medisearch_backend::models::parse_indices;
use medisearch_backend::search::{self, SearchQuery, StatusFilter, DEFAULT_LIMIT};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub discontinued: String,
    pub limit: Option<String>,
}

impl SearchParams {
    /// Validate raw query-string values into a [`SearchQuery`] / 校验查询参数
    pub fn to_query(&self) -> AppResult<SearchQuery> {
        let status: StatusFilter = self.discontinued.parse().map_err(AppError::Validation)?;
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LIMIT,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| AppError::validation(format!("Invalid limit: {}", raw)))?,
        };

        Ok(SearchQuery::new(self.q.clone())
            .with_manufacturer(self.manufacturer.clone())
            .with_status(status)
            .with_limit(limit))
    }
}

/// Negative and out-of-range indices are both NotFound / 查找单个药品
pub fn resolve_index(dataset: &Dataset, index: i64) -> AppResult<&MedicineRecord> {
    usize::try_from(index)
        .ok()
        .and_then(|i| dataset.get(i))
        .ok_or_else(|| AppError::not_found(format!("Medicine not found: {}", index)))
}

/// Look up every index or fail with NotFound on the first bad one / 批量查找药品
pub fn resolve_indices<'a>(dataset: &'a Dataset, indices: &[i64]) -> AppResult<Vec<&'a MedicineRecord>> {
    indices.iter().map(|&i| resolve_index(dataset, i)).collect()
}

/// GET /api/v1/medicines/search
pub async fn search_medicines(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Value>> {
    let query = params.to_query()?;
    let medicines = search::search(&state.dataset, &query);

    Ok(Json(json!({
        "count": medicines.len(),
        "medicines": medicines,
    })))
}

/// GET /api/v1/medicines/:index - details plus alternatives / 药品详情
pub async fn get_medicine(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> AppResult<Json<Value>> {
    // 非数字路径同样按不存在处理
    let index = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::not_found(format!("Medicine not found: {}", raw)))?;
    let medicine = resolve_index(&state.dataset, index)?;

    let alternatives = search::find_alternatives(&state.dataset, medicine, medicine.index);

    Ok(Json(json!({
        "medicine": medicine,
        "alternatives": alternatives,
    })))
}

#[derive(Debug, Deserialize)]
pub struct IndicesParams {
    #[serde(default)]
    pub indices: String,
}

/// GET /api/v1/medicines/compare?indices=1,2,3
pub async fn compare_medicines(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IndicesParams>,
) -> AppResult<Json<Value>> {
    let indices = parse_indices(&params.indices).map_err(AppError::Validation)?;
    let medicines = resolve_indices(&state.dataset, &indices)?;

    Ok(Json(json!({
        "indices": indices,
        "medicines": medicines,
    })))
}

/// GET /api/v1/manufacturers
pub async fn list_manufacturers(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.dataset.manufacturers())
}
