use anyhow::Context;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod db;
mod state;

use medisearch_backend::config;
use medisearch_backend::dataset::Dataset;
use medisearch_backend::prescription::TesseractOcr;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medisearch_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config().map_err(anyhow::Error::msg)?;
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }
    let upload_dir = app_config.get_upload_dir();
    std::fs::create_dir_all(&upload_dir)
        .with_context(|| format!("Failed to create upload directory {:?}", upload_dir))?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| app_config.get_database_url());

    let pool = SqlitePool::connect(&database_url)
        .await
        .with_context(|| format!("Failed to open database {}", database_url))?;

    db::run_migrations(&pool).await?;

    // 数据集只在启动时加载一次
    let dataset = Dataset::load(&app_config.dataset.path)
        .with_context(|| format!("Failed to load medicine dataset from {}", app_config.dataset.path))?;
    if dataset.is_empty() {
        tracing::warn!("Medicine dataset {} is empty", app_config.dataset.path);
    }

    let ocr = Arc::new(TesseractOcr::new(&app_config.ocr));
    let bind_address = app_config.get_bind_address();

    let state = Arc::new(AppState::new(pool, dataset, ocr, app_config));
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("MediSearch listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
