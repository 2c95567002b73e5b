//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Medicine dataset / 药品数据集
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Session and password settings / 会话与密码配置
    #[serde(default)]
    pub auth: AuthConfig,
    /// Prescription upload settings / 处方上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// OCR settings / OCR配置
    #[serde(default)]
    pub ocr: OcrConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Database configuration / 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Main database file path (relative to data_dir) / 主数据库文件路径
    pub db_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// CSV file with the medicine rows / 药品CSV文件路径
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in hours / 会话有效期（小时）
    pub session_ttl_hours: i64,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory (relative to data_dir) / 上传目录
    pub dir: String,
    /// Request body limit in MB / 上传大小限制
    pub max_size_mb: usize,
    /// Allowed file extensions, lowercase / 允许的扩展名
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Path or name of the tesseract binary / tesseract 可执行文件
    pub tesseract_path: String,
    /// Tesseract language code / 语言
    pub language: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "medisearch.db".to_string(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: "data/medicines_sample.csv".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24 * 7,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            max_size_mb: 16,
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "bmp", "pdf"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            language: "eng".to_string(),
        }
    }
}

impl AppConfig {
    /// Get the full database URL / 获取完整的数据库URL
    pub fn get_database_url(&self) -> String {
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the prescription upload directory / 获取上传目录
    pub fn get_upload_dir(&self) -> PathBuf {
        let data_dir = self.get_data_dir();
        if self.upload.dir.is_empty() {
            data_dir
        } else {
            data_dir.join(&self.upload.dir)
        }
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Check an uploaded file name against the allowed extensions / 检查扩展名
    pub fn is_allowed_upload(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_lowercase();
                self.upload.allowed_extensions.iter().any(|a| *a == ext)
            }
            None => false,
        }
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    load_config_from(&get_config_path())
}

/// Load configuration from an explicit path / 从指定路径加载配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
