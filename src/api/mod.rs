pub mod auth;
pub mod comparisons;
pub mod interactions;
pub mod medicines;
pub mod prescriptions;
pub mod saved_searches;
pub mod server;
pub mod stats;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the application router / 构建路由
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.upload.max_size_mb * 1024 * 1024;

    let v1 = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::get_current_user))
        .route("/medicines/search", get(medicines::search_medicines))
        .route("/medicines/compare", get(medicines::compare_medicines))
        .route("/medicines/:index", get(medicines::get_medicine))
        .route("/manufacturers", get(medicines::list_manufacturers))
        .route("/stats", get(stats::get_stats))
        .route("/analytics", get(stats::get_analytics))
        .route("/interactions/check", post(interactions::check))
        .route(
            "/saved-searches",
            get(saved_searches::list_saved_searches).post(saved_searches::create_saved_search),
        )
        .route("/saved-searches/:id", delete(saved_searches::delete_saved_search))
        .route("/saved-searches/:id/results", get(saved_searches::run_saved_search))
        .route(
            "/comparisons",
            get(comparisons::list_comparisons).post(comparisons::create_comparison),
        )
        .route("/comparisons/:id", delete(comparisons::delete_comparison))
        .route(
            "/prescriptions",
            get(prescriptions::list_prescriptions).post(prescriptions::upload_prescription),
        );

    Router::new()
        .route("/api/health", get(server::health_check))
        .nest("/api/v1", v1)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::run_migrations;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use medisearch_backend::config::AppConfig;
    use medisearch_backend::dataset::{Dataset, Discontinued, MedicineRecord};
    use medisearch_backend::prescription::{MockOcrEngine, OcrEngine};
    use serde_json::{json, Value};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    fn dataset() -> Dataset {
        Dataset::from_records(vec![
            MedicineRecord::new(0, "Crocin Advance Tablet", "GSK", "Paracetamol (500mg)", "Fever and pain relief", Discontinued::No),
            MedicineRecord::new(0, "Dolo 650 Tablet", "Micro Labs", "Paracetamol (650mg)", "Fever", Discontinued::No),
            MedicineRecord::new(0, "Disprin Tablet", "Reckitt", "Aspirin (325mg)", "Pain relief", Discontinued::No),
            MedicineRecord::new(0, "Brufen 400 Tablet", "Abbott", "Ibuprofen (400mg)", "Pain and inflammation", Discontinued::Yes),
            MedicineRecord::new(0, "Glycomet 500 Tablet", "USV", "Metformin (500mg)", "Type 2 diabetes", Discontinued::No),
        ])
    }

    struct TestApp {
        router: Router,
        pool: sqlx::SqlitePool,
        upload_dir: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn app_with_ocr(ocr: Arc<dyn OcrEngine>) -> TestApp {
        let dir = tempfile::tempdir().unwrap();

        // 单连接，保证所有查询落在同一个内存数据库
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let mut config = AppConfig::default();
        config.database.data_dir = dir.path().to_string_lossy().to_string();
        config.auth.bcrypt_cost = 4;

        let upload_dir = config.get_upload_dir();
        let state = Arc::new(AppState::new(pool.clone(), dataset(), ocr, config));
        TestApp {
            router: build_router(state),
            pool,
            upload_dir,
            _dir: dir,
        }
    }

    async fn app() -> TestApp {
        app_with_ocr(Arc::new(MockOcrEngine::new(""))).await
    }

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn register(app: &TestApp, username: &str) -> String {
        let (status, body) = send(
            app,
            json_request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "secret123",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = send(&app, get_request("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_search_shape() {
        let app = app().await;
        let (status, body) = send(
            &app,
            get_request("/api/v1/medicines/search?q=paracetamol&discontinued=active", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["medicines"][0]["name"], "Crocin Advance Tablet");
        assert_eq!(body["medicines"][1]["index"], 1);

        let (status, body) = send(&app, get_request("/api/v1/medicines/search?q=x&discontinued=maybe", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("maybe"));
    }

    #[tokio::test]
    async fn test_medicine_detail_and_compare() {
        let app = app().await;

        let (status, body) = send(&app, get_request("/api/v1/medicines/0", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["medicine"]["name"], "Crocin Advance Tablet");
        assert_eq!(body["alternatives"][0]["name"], "Dolo 650 Tablet");

        let (status, _) = send(&app, get_request("/api/v1/medicines/99", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, get_request("/api/v1/medicines/compare?indices=2,4", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["medicines"].as_array().unwrap().len(), 2);
        assert_eq!(body["medicines"][1]["manufacturer"], "USV");

        let (status, _) = send(&app, get_request("/api/v1/medicines/compare?indices=2,40", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_interaction_check() {
        let app = app().await;

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/interactions/check", None, json!({"medicine_indices": [0, 1]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["medicines"].as_array().unwrap().len(), 2);
        assert_eq!(body["interactions"][0]["type"], "duplicate_ingredient");
        assert_eq!(body["interactions"][0]["severity"], "high");

        let (status, _) = send(
            &app,
            json_request(Method::POST, "/api/v1/interactions/check", None, json!({"medicine_indices": [0]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            json_request(Method::POST, "/api/v1/interactions/check", None, json!({"medicine_indices": [0, 500]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_saved_search_round_trip() {
        let app = app().await;
        register(&app, "alice").await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                json!({"username": "alice", "password": "secret123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(body["user"]["username"], "alice");

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/saved-searches",
                Some(&token),
                json!({"query": "paracetamol", "filters": {"manufacturer": "GSK", "discontinued": "active"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["saved_search"]["id"].as_i64().unwrap();

        let (status, body) = send(&app, get_request("/api/v1/saved-searches", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved_searches"].as_array().unwrap().len(), 1);
        assert_eq!(body["saved_searches"][0]["filters"]["manufacturer"], "GSK");

        let (status, body) = send(
            &app,
            get_request(&format!("/api/v1/saved-searches/{}/results", id), Some(&token)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["medicines"][0]["name"], "Crocin Advance Tablet");

        let (status, _) = send(
            &app,
            json_request(Method::DELETE, &format!("/api/v1/saved-searches/{}", id), Some(&token), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, get_request("/api/v1/saved-searches", Some(&token))).await;
        assert!(body["saved_searches"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_delete_other_users_search() {
        let app = app().await;
        let alice = register(&app, "alice").await;
        let bob = register(&app, "bob").await;

        let (_, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/saved-searches", Some(&alice), json!({"query": "aspirin"})),
        )
        .await;
        let id = body["saved_search"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            json_request(Method::DELETE, &format!("/api/v1/saved-searches/{}", id), Some(&bob), Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Saved search not found");

        let (_, body) = send(&app, get_request("/api/v1/saved-searches", Some(&alice))).await;
        assert_eq!(body["saved_searches"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auth_required() {
        let app = app().await;

        let (status, body) = send(&app, get_request("/api/v1/saved-searches", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");

        let (status, body) = send(&app, get_request("/api/v1/comparisons", Some("bogus"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");

        let (status, _) = send(&app, get_request("/api/v1/analytics", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_registration_and_bad_login() {
        let app = app().await;
        register(&app, "carol").await;

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                json!({"username": "carol", "email": "other@example.com", "password": "secret123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username already exists");

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                json!({"username": "carol", "password": "wrong-password"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_blocked_after_failures() {
        let app = app().await;
        register(&app, "dave").await;

        let bad = json!({"username": "dave", "password": "nope-nope"});
        for _ in 0..5 {
            let (status, _) = send(&app, json_request(Method::POST, "/api/v1/auth/login", None, bad.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        // 正确密码也被拒绝
        let (status, _) = send(
            &app,
            json_request(Method::POST, "/api/v1/auth/login", None, json!({"username": "dave", "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_comparisons_and_analytics() {
        let app = app().await;
        let token = register(&app, "erin").await;

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/comparisons", Some(&token), json!({"medicine_indices": "0,2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["comparison"]["title"], "Untitled Comparison");
        assert_eq!(body["comparison"]["medicine_indices"], json!([0, 2]));

        let (status, _) = send(
            &app,
            json_request(Method::POST, "/api/v1/comparisons", Some(&token), json!({"medicine_indices": [0, 77]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, get_request("/api/v1/analytics", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_stats"]["comparisons"], 1);
        assert_eq!(body["user_stats"]["saved_searches"], 0);
        assert_eq!(body["db_stats"]["total"], 5);
        assert_eq!(body["db_stats"]["discontinued"], 1);
        assert_eq!(body["categories"]["pain"], 3);
    }

    #[tokio::test]
    async fn test_expired_session_rejected_and_removed() {
        let app = app().await;
        let token = register(&app, "hank").await;

        sqlx::query("UPDATE sessions SET expires_at = 0").execute(&app.pool).await.unwrap();

        let (status, body) = send(&app, get_request("/api/v1/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Token has expired");

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&app.pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_negative_index_is_not_found() {
        let app = app().await;
        let token = register(&app, "gina").await;

        let (status, body) = send(&app, get_request("/api/v1/medicines/-1", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Medicine not found: -1");

        let (status, body) = send(&app, get_request("/api/v1/medicines/abc", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (status, body) = send(&app, get_request("/api/v1/medicines/compare?indices=0,-1", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Medicine not found: -1");

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/comparisons", Some(&token), json!({"medicine_indices": [0, -1]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Medicine not found: -1");

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/comparisons", Some(&token), json!({"medicine_indices": "0,-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Medicine not found: -1");

        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/v1/interactions/check", None, json!({"medicine_indices": [0, -1]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Medicine not found: -1");

        // 非法索引不会产生对比记录
        let (_, body) = send(&app, get_request("/api/v1/comparisons", Some(&token))).await;
        assert!(body["comparisons"].as_array().unwrap().is_empty());
    }

    fn multipart_request(filename: &str, token: Option<&str>) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"prescription\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\nfake-image-bytes\r\n--{b}--\r\n",
            b = boundary,
            f = filename,
        );
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/prescriptions")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary));
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_prescription_upload() {
        let ocr = Arc::new(MockOcrEngine::new("Rx\nCrocin Advance Tablet 1-0-1\nfor 5 days"));
        let app = app_with_ocr(ocr).await;
        let token = register(&app, "frank").await;

        let (status, body) = send(&app, multipart_request("scan one.png", Some(&token))).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert!(body["prescription_id"].as_i64().is_some());
        assert_eq!(body["medicines"][0]["name"], "Crocin Advance Tablet");
        assert_eq!(body["medicines"][0]["confidence"], "high");
        assert_eq!(body["medicines"][0]["index"], 0);

        let (status, body) = send(&app, get_request("/api/v1/prescriptions", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prescriptions"].as_array().unwrap().len(), 1);
        assert_eq!(body["prescriptions"][0]["filename"], "scan_one.png");
    }

    #[tokio::test]
    async fn test_failed_insert_removes_stored_upload() {
        let app = app().await;
        sqlx::query("DROP TABLE prescriptions").execute(&app.pool).await.unwrap();

        let (status, body) = send(&app, multipart_request("rx.png", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let leftovers = std::fs::read_dir(&app.upload_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_prescription_upload_rejections() {
        let app = app().await;

        let (status, _) = send(&app, multipart_request("notes.txt", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, multipart_request("", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // 匿名上传允许
        let (status, body) = send(&app, multipart_request("rx.jpg", None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["medicines"][0]["name"], "No text extracted");
    }
}
