#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use shop_service::config::{
    AuthConfig, ConsoleConfig, JwtConfig, MailerConfig, MongoConfig, OtpConfig, ShopConfig,
    ShopProfile, SmtpConfig, StorageBackend,
};
use shop_service::services::{InvoiceMailer, MemoryStore, MockEmailProvider};
use shop_service::startup::Application;
use shop_service::{build_router, AppState};
use tokio::task::JoinHandle;
use tower::ServiceExt;

pub fn test_config(auth_required: bool) -> ShopConfig {
    ShopConfig {
        common: CoreConfig {
            port: 0,
            ..CoreConfig::default()
        },
        storage: StorageBackend::Memory,
        mongodb: MongoConfig {
            uri: std::env::var("TEST_MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            database: format!("shop_test_{}", uuid::Uuid::new_v4().simple()),
        },
        smtp: SmtpConfig {
            host: "smtp.test.local".to_string(),
            port: 587,
            user: "test".to_string(),
            password: "test".to_string(),
            from_email: "test@example.com".to_string(),
            from_name: "Test Shop".to_string(),
            enabled: false, // Use mock
        },
        jwt: JwtConfig {
            secret: "integration-test-secret-value".to_string(),
            issuer: "shop-service-test".to_string(),
            access_token_expiry_minutes: 15,
        },
        auth: AuthConfig {
            required: auth_required,
            operator_emails: Vec::new(),
        },
        otp: OtpConfig::default(),
        shop: ShopProfile::default(),
        mailer: MailerConfig { queue_capacity: 16 },
        console: ConsoleConfig {
            invoice_dir: std::env::temp_dir().display().to_string(),
        },
    }
}

/// Router over an in-memory store, driven with `oneshot` requests.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub email: Arc<MockEmailProvider>,
    pub token: Option<String>,
    pub mailer_worker: Option<JoinHandle<()>>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).expect("Response body is not JSON")
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config(false))
    }

    pub fn with_config(config: ShopConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(MockEmailProvider::new(true));
        let state = AppState::new(config, store.clone(), email.clone(), None)
            .expect("Failed to build app state");

        TestApp {
            router: build_router(state),
            store,
            email,
            token: None,
            mailer_worker: None,
        }
    }

    /// Same as `new`, with the invoice mailer worker running.
    pub fn with_mailer() -> Self {
        let config = test_config(false);
        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(MockEmailProvider::new(true));
        let (mailer, worker) = InvoiceMailer::start(
            email.clone(),
            config.shop.clone(),
            config.mailer.queue_capacity,
        );
        let state = AppState::new(config, store.clone(), email.clone(), Some(mailer))
            .expect("Failed to build app state");

        TestApp {
            router: build_router(state),
            store,
            email,
            token: None,
            mailer_worker: Some(worker),
        }
    }

    /// Drop the router and wait for queued mail to go out.
    pub async fn drain_mail(mut self) -> Arc<MockEmailProvider> {
        let worker = self.mailer_worker.take();
        let email = self.email.clone();
        drop(self);
        if let Some(worker) = worker {
            worker.await.expect("Mailer worker panicked");
        }
        email
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request("POST", uri, Some(body)).await
    }

    /// Adds an item over the API and returns its id.
    pub async fn add_item(&self, name: &str, price: &str, stock: i64) -> String {
        let response = self
            .post(
                "/api/items",
                serde_json::json!({ "item_name": name, "item_price": price, "stock": stock }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        response.json()["item"]["_id"]
            .as_str()
            .expect("Missing item id")
            .to_string()
    }
}

/// Full server on a random port, for tests that go over the network.
pub struct SpawnedApp {
    pub address: String,
}

impl SpawnedApp {
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(MockEmailProvider::new(true));
        let app = Application::build_with(test_config(false), store, email)
            .await
            .expect("Failed to build test application");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        SpawnedApp { address }
    }
}

pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .expect("Decimal fields serialize as strings")
        .parse()
        .expect("Invalid decimal")
}
