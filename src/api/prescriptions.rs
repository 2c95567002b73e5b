//! 处方上传与识别

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{optional_user, require_user};
use crate::state::AppState;
use medisearch_backend::error::{AppError, AppResult};
use medisearch_backend::models::{Prescription, PrescriptionRow};
use medisearch_backend::prescription::analyze_ocr_result;

/// Multipart field carrying the image / 上传字段名
pub const UPLOAD_FIELD: &str = "prescription";

/// Keep ASCII alphanumerics, '.', '-' and '_'; drop path parts and leading dots
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// POST /api/v1/prescriptions - 登录可选
pub async fn upload_prescription(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let user = optional_user(&state, &headers).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, data.to_vec()));
    }

    let (filename, data) = upload.ok_or_else(|| AppError::validation("No file uploaded"))?;
    if filename.trim().is_empty() {
        return Err(AppError::validation("No file selected"));
    }
    if !state.config.is_allowed_upload(&filename) {
        return Err(AppError::validation(
            "Invalid file type. Please upload an image (PNG, JPG, JPEG, GIF, BMP) or PDF",
        ));
    }

    let safe_name = sanitize_filename(&filename);
    let stored_name = format!("{}_{}", uuid::Uuid::new_v4(), safe_name);
    let upload_dir = state.config.get_upload_dir();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("create upload dir: {}", e)))?;
    let filepath = upload_dir.join(&stored_name);
    tokio::fs::write(&filepath, &data)
        .await
        .map_err(|e| AppError::Internal(format!("save upload: {}", e)))?;

    tracing::info!("Saved prescription upload {:?} ({} bytes)", filepath, data.len());

    let ocr = state.ocr.extract_text(&data, &extension_of(&safe_name)).await;
    let medicines = analyze_ocr_result(&state.dataset, ocr);

    let medicines_json = serde_json::to_string(&medicines)
        .map_err(|e| AppError::Internal(format!("serialize medicines: {}", e)))?;

    let inserted = sqlx::query(
        "INSERT INTO prescriptions (user_id, filename, filepath, extracted_medicines, uploaded_at) VALUES (?, ?, ?, ?, ?)"
    )
    .bind(user.as_ref().map(|u| u.id.as_str()))
    .bind(&safe_name)
    .bind(filepath.to_string_lossy().to_string())
    .bind(&medicines_json)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await;

    let prescription_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(e) => {
            // 记录未保存，删除已写入的文件
            if let Err(rm) = tokio::fs::remove_file(&filepath).await {
                tracing::warn!("Failed to remove orphaned upload {:?}: {}", filepath, rm);
            }
            return Err(e.into());
        }
    };

    Ok((StatusCode::CREATED, Json(json!({
        "prescription_id": prescription_id,
        "medicines": medicines,
    }))))
}

/// GET /api/v1/prescriptions
pub async fn list_prescriptions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let user = require_user(&state, &headers).await?;

    let rows = sqlx::query_as::<_, PrescriptionRow>(
        "SELECT * FROM prescriptions WHERE user_id = ? ORDER BY uploaded_at DESC, id DESC"
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    let prescriptions: Vec<Prescription> = rows.into_iter().map(Prescription::from).collect();
    Ok(Json(json!({ "prescriptions": prescriptions })))
}
