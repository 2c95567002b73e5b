use sqlx::SqlitePool;
use medisearch_backend::config::AppConfig;
use medisearch_backend::dataset::Dataset;
use medisearch_backend::prescription::OcrEngine;
use std::sync::Arc;
use std::collections::HashMap;
use parking_lot::RwLock;
use chrono::{DateTime, Utc};

/// Failed logins before a username is blocked / 锁定前允许的失败次数
pub const MAX_LOGIN_FAILURES: u32 = 5;
/// Block window in minutes / 锁定时长（分钟）
pub const LOGIN_BLOCK_MINUTES: i64 = 30;

/// Login failure records / 登录失败记录
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub fail_count: u32,
    pub last_attempt: DateTime<Utc>,
}

/// Login security state / 登录安全状态
pub struct LoginSecurity {
    /// username -> LoginAttempt / 用户登录失败记录
    pub user_attempts: RwLock<HashMap<String, LoginAttempt>>,
}

impl LoginSecurity {
    pub fn new() -> Self {
        Self {
            user_attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Check if username is blocked (5+ failures within 30 minutes) / 检查用户是否被锁定
    pub fn is_blocked(&self, username: &str) -> bool {
        let attempts = self.user_attempts.read();
        if let Some(attempt) = attempts.get(username) {
            if attempt.fail_count >= MAX_LOGIN_FAILURES {
                let elapsed = Utc::now().signed_duration_since(attempt.last_attempt);
                return elapsed.num_minutes() < LOGIN_BLOCK_MINUTES;
            }
        }
        false
    }

    /// Record login failure / 记录登录失败
    pub fn record_failure(&self, username: &str) {
        let now = Utc::now();
        let mut attempts = self.user_attempts.write();
        // Drop records older than the block window, the caller's included / 过期记录清除后重新计数
        attempts.retain(|_, a| now.signed_duration_since(a.last_attempt).num_minutes() < LOGIN_BLOCK_MINUTES);
        let entry = attempts.entry(username.to_string()).or_insert(LoginAttempt {
            fail_count: 0,
            last_attempt: now,
        });
        entry.fail_count += 1;
        entry.last_attempt = now;
    }

    /// Login successful, clear failure records / 登录成功
    pub fn clear_failure(&self, username: &str) {
        self.user_attempts.write().remove(username);
    }
}

impl Default for LoginSecurity {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AppState {
    pub db: SqlitePool,
    /// Loaded once at startup, never mutated / 启动时加载，只读
    pub dataset: Arc<Dataset>,
    pub ocr: Arc<dyn OcrEngine>,
    pub config: AppConfig,
    pub login_security: LoginSecurity,
}

impl AppState {
    pub fn new(db: SqlitePool, dataset: Dataset, ocr: Arc<dyn OcrEngine>, config: AppConfig) -> Self {
        Self {
            db,
            dataset: Arc::new(dataset),
            ocr,
            config,
            login_security: LoginSecurity::new(),
        }
    }
}
