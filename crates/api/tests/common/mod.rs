#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use navlens_api::auth::jwt::{generate_access_token, JwtConfig, SESSION_COOKIE};
use navlens_api::config::ServerConfig;
use navlens_api::router::build_app_router;
use navlens_api::state::AppState;
use navlens_core::error::CoreError;
use navlens_core::modification::Modification;
use navlens_core::signature::sign;
use navlens_core::store::{
    ConfigPublisher, EditorTokenRecord, EditorTokenStore, ExperimentRecord, OwnershipDirectory,
    VariantStore,
};

pub const EDITOR_SECRET: &str = "test-editor-signing-secret";
pub const DASHBOARD_ORIGIN: &str = "http://localhost:5173";

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub site_owners: Mutex<HashMap<String, String>>,
    pub experiments: Mutex<HashMap<String, ExperimentRecord>>,
    pub variants: Mutex<HashMap<String, String>>,
    pub modifications: Mutex<HashMap<String, Vec<serde_json::Value>>>,
    pub tokens: Mutex<HashMap<String, EditorTokenRecord>>,
    pub fail_saves: Mutex<bool>,
}

impl MemoryStore {
    /// Two sites with one experiment and one variant each. `exp-1` is running.
    pub fn seeded() -> Self {
        let store = Self::default();
        {
            let mut owners = store.site_owners.lock().unwrap();
            owners.insert("site-1".into(), "alice".into());
            owners.insert("site-2".into(), "bob".into());

            let mut experiments = store.experiments.lock().unwrap();
            for (id, site, status) in [("exp-1", "site-1", "running"), ("exp-2", "site-2", "draft")] {
                experiments.insert(
                    id.into(),
                    ExperimentRecord {
                        id: id.into(),
                        site_id: site.into(),
                        status: status.into(),
                    },
                );
            }

            let mut variants = store.variants.lock().unwrap();
            variants.insert("var-1".into(), "exp-1".into());
            variants.insert("var-2".into(), "exp-2".into());
        }
        store
    }

    pub fn stored(&self, variant_id: &str) -> Vec<serde_json::Value> {
        self.modifications
            .lock()
            .unwrap()
            .get(variant_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn put_raw(&self, variant_id: &str, entries: Vec<serde_json::Value>) {
        self.modifications
            .lock()
            .unwrap()
            .insert(variant_id.into(), entries);
    }
}

#[async_trait]
impl OwnershipDirectory for MemoryStore {
    async fn site_owner(&self, site_id: &str) -> Result<Option<String>, CoreError> {
        Ok(self.site_owners.lock().unwrap().get(site_id).cloned())
    }

    async fn experiment(&self, experiment_id: &str) -> Result<Option<ExperimentRecord>, CoreError> {
        Ok(self.experiments.lock().unwrap().get(experiment_id).cloned())
    }

    async fn variant_experiment(&self, variant_id: &str) -> Result<Option<String>, CoreError> {
        Ok(self.variants.lock().unwrap().get(variant_id).cloned())
    }
}

#[async_trait]
impl VariantStore for MemoryStore {
    async fn load_modifications(
        &self,
        variant_id: &str,
    ) -> Result<Vec<serde_json::Value>, CoreError> {
        Ok(self.stored(variant_id))
    }

    async fn save_modifications(
        &self,
        variant_id: &str,
        modifications: &[Modification],
    ) -> Result<(), CoreError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(CoreError::Persistence("connection reset".into()));
        }
        let entries = modifications
            .iter()
            .map(|m| serde_json::to_value(m).unwrap())
            .collect();
        self.put_raw(variant_id, entries);
        Ok(())
    }
}

#[async_trait]
impl EditorTokenStore for MemoryStore {
    async fn insert_token(&self, token: &EditorTokenRecord) -> Result<(), CoreError> {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_token(&self, token_hash: &str) -> Result<Option<EditorTokenRecord>, CoreError> {
        Ok(self.tokens.lock().unwrap().get(token_hash).cloned())
    }

    async fn mark_token_used(&self, token_hash: &str) -> Result<bool, CoreError> {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.get_mut(token_hash) {
            Some(token) if !token.used => {
                token.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Records every publish request.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ConfigPublisher for RecordingPublisher {
    async fn publish(&self, experiment_id: &str, site_id: &str) -> Result<(), CoreError> {
        self.published
            .lock()
            .unwrap()
            .push((experiment_id.into(), site_id.into()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub config: ServerConfig,
    pub uploads: tempfile::TempDir,
}

pub fn test_config(upload_dir: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![DASHBOARD_ORIGIN.to_string()],
        request_timeout_secs: 30,
        editor_signing_secret: EDITOR_SECRET.to_string(),
        jwt: JwtConfig {
            secret: "test-jwt-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: 15,
        },
        upload_dir: upload_dir.to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        max_upload_bytes: 1024,
        config_publish_url: None,
    }
}

/// Build the full application router over a seeded in-memory store.
pub fn build_test_app() -> TestApp {
    build_test_app_with_upload_limit(1024)
}

pub fn build_test_app_with_upload_limit(max_upload_bytes: usize) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let mut config = test_config(uploads.path().to_str().unwrap());
    config.max_upload_bytes = max_upload_bytes;
    let store = Arc::new(MemoryStore::seeded());
    let publisher = Arc::new(RecordingPublisher::default());

    let state = AppState {
        store: store.clone(),
        publisher: publisher.clone(),
        config: Arc::new(config.clone()),
    };
    let router = build_app_router(state, &config);

    TestApp {
        router,
        store,
        publisher,
        config,
        uploads,
    }
}

impl TestApp {
    pub fn session_cookie(&self, user_id: &str) -> String {
        let token = generate_access_token(user_id, &self.config.jwt).unwrap();
        format!("{SESSION_COOKIE}={token}")
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn signature(experiment_id: &str, variant_id: &str, timestamp: i64) -> String {
    sign(EDITOR_SECRET, experiment_id, variant_id, timestamp)
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(
    app: &TestApp,
    uri: &str,
    body: serde_json::Value,
    cookie: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
