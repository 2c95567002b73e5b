use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::medicines::resolve_indices;
use crate::state::AppState;
use medisearch_backend::error::{AppError, AppResult};
use medisearch_backend::interactions::check_interactions;

#[derive(Debug, Deserialize)]
pub struct CheckInteractionsRequest {
    #[serde(default)]
    pub medicine_indices: Vec<i64>,
}

/// POST /api/v1/interactions/check - 检查药物相互作用
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckInteractionsRequest>,
) -> AppResult<Json<Value>> {
    if req.medicine_indices.len() < 2 {
        return Err(AppError::validation("At least 2 medicines are required"));
    }

    let medicines = resolve_indices(&state.dataset, &req.medicine_indices)?;
    let interactions = check_interactions(&medicines);

    Ok(Json(json!({
        "medicines": medicines,
        "interactions": interactions,
    })))
}
