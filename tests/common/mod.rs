#![allow(dead_code)]

use std::sync::Arc;

use axion::state::{AppConfig, AppState, Services};
use axion_cache::CacheConfig;
use axion_config::{
    CorsConfig, LoginGuardConfig, PolicyConfig, RateLimitConfig, ServerConfig, TokenConfig,
};
use axion_core::ManualClock;
use axion_store::{KvStore, MemoryKv, MemoryPubSub, keys};
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "Passw0rd1";
pub const SUPERADMIN_EMAIL: &str = "root@axion.test";
pub const SCHOOL_ID: &str = "school-north";
pub const OTHER_SCHOOL_ID: &str = "school-south";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub config: AppConfig,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        cors: CorsConfig::default(),
        token: TokenConfig::with_secret(TEST_SECRET),
        policy: PolicyConfig::default(),
        rate_limit: RateLimitConfig {
            max_requests: 10_000,
            ..RateLimitConfig::default()
        },
        login_guard: LoginGuardConfig {
            salt_rounds: 4,
            ..LoginGuardConfig::default()
        },
        cache: CacheConfig::default(),
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

/// In-memory application with a manual clock and two seeded schools.
pub fn spawn_app_with(config: AppConfig) -> TestApp {
    let clock = ManualClock::starting_now();
    let kv = Arc::new(MemoryKv::new(clock.clone()));
    spawn_app_on(config, clock, kv)
}

/// Application over a caller-supplied key-value backend.
pub fn spawn_app_on(config: AppConfig, clock: Arc<ManualClock>, kv: Arc<dyn KvStore>) -> TestApp {
    let pubsub = Arc::new(MemoryPubSub::new());
    let services = Services::new(kv, pubsub, clock.clone(), &config);
    let state = AppState::new(services, &config).unwrap();
    let router = axion::router::init_router(state.clone());

    TestApp {
        state,
        router,
        clock,
        config,
    }
}

impl TestApp {
    pub async fn seed_schools(&self) {
        for (id, name) in [(SCHOOL_ID, "North High"), (OTHER_SCHOOL_ID, "South High")] {
            self.state
                .services
                .store
                .upsert_doc(keys::SCHOOLS, Some(id), json!({ "name": name }))
                .await
                .unwrap();
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(body) => Body::from(serde_json::to_vec(&body).unwrap()),
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, path, token, Some(body)).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, path, token, None).await
    }

    /// Bootstraps the superadmin and returns `(access_token, refresh_token, user_id)`.
    pub async fn bootstrap_superadmin(&self) -> (String, String, String) {
        let (status, body) = self
            .post(
                "/api/auth/v1_bootstrapSuperadmin",
                None,
                json!({
                    "email": SUPERADMIN_EMAIL,
                    "password": PASSWORD,
                    "firstName": "Root",
                    "lastName": "Admin"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "bootstrap failed: {}", body);
        tokens(&body)
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/v1_login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Creates a school admin through the API and logs them in.
    pub async fn school_admin(
        &self,
        superadmin_token: &str,
        email: &str,
        school_id: &str,
    ) -> (String, String, String) {
        let (status, body) = self
            .post(
                "/api/auth/v1_createSchoolAdmin",
                Some(superadmin_token),
                json!({
                    "schoolId": school_id,
                    "email": email,
                    "password": PASSWORD,
                    "firstName": "School",
                    "lastName": "Admin"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "createSchoolAdmin failed: {}", body);

        let (status, body) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        tokens(&body)
    }
}

pub fn tokens(body: &Value) -> (String, String, String) {
    let data = &body["data"];
    (
        data["token"].as_str().unwrap().to_string(),
        data["refreshToken"].as_str().unwrap().to_string(),
        data["user"]["_id"].as_str().unwrap().to_string(),
    )
}
