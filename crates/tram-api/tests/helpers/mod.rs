//! Test helpers: build the router over in-memory repositories and a
//! temporary local storage directory.
//!
//! Run with: `cargo test -p tram-api`

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestRequest, TestServer};
use tempfile::TempDir;
use tram_api::setup::routes;
use tram_api::state::AppState;
use tram_core::{Config, FileModelManager};
use tram_db::test_helpers::InMemoryStore;
use tram_storage::LocalStorage;

pub const TEST_USER: &str = "analyst";

pub struct TestApp {
    pub server: TestServer,
    pub store: InMemoryStore,
    pub storage: Arc<LocalStorage>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn get(&self, path: &str) -> TestRequest {
        self.server.get(path).add_header("X-Remote-User", TEST_USER)
    }

    pub fn post(&self, path: &str) -> TestRequest {
        self.server.post(path).add_header("X-Remote-User", TEST_USER)
    }

    pub fn patch(&self, path: &str) -> TestRequest {
        self.server.patch(path).add_header("X-Remote-User", TEST_USER)
    }

    pub fn delete(&self, path: &str) -> TestRequest {
        self.server.delete(path).add_header("X-Remote-User", TEST_USER)
    }

    /// `POST /upload` with a single `file` part.
    pub fn upload(&self, data: &[u8], file_name: &str, content_type: &str) -> TestRequest {
        let part = Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_type(content_type.to_string());
        self.post("/upload")
            .multipart(MultipartForm::new().add_part("file", part))
    }

    /// Import a report from JSON and return its id.
    pub async fn import_report(&self, body: &serde_json::Value) -> i64 {
        let before: Vec<serde_json::Value> = self.get("/api/reports").await.json();
        let response = self
            .upload(body.to_string().as_bytes(), "report.json", "application/json")
            .await;
        assert_eq!(response.status_code(), 200, "{}", response.text());

        let after: Vec<serde_json::Value> = self.get("/api/reports").await.json();
        assert_eq!(after.len(), before.len() + 1);
        after
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .max()
            .expect("imported report id")
    }
}

/// Setup test app with in-memory repositories and isolated local storage.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let config = Config::local("postgres://localhost/tram_test", temp_dir.path());

    let storage = Arc::new(
        LocalStorage::new(temp_dir.path())
            .await
            .expect("local storage"),
    );
    let store = InMemoryStore::with_attack_objects(fixtures::TECHNIQUES);

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        storage.clone(),
        Arc::new(FileModelManager::new(None)),
    ));

    let router = routes::setup_routes(&config, state).expect("router");
    let server = TestServer::new(router.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        store,
        storage,
        _temp_dir: temp_dir,
    }
}
