use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use std::time::Duration;
use tabletop_platform_service::infrastructure::{
    backend::RateLimitGuard,
    config::{
        AppConfig, AuthProviderConfig, BackendConfig, LoggingConfig, RateLimitConfig, RuntimeMode,
        ServerConfig,
    },
    http::create_app,
};
use tabletop_platform_service::presentation::handlers::AppState;
use tower::ServiceExt;

/// Configuration pointing the service at test doubles. Empty URLs leave the
/// corresponding boundary unconfigured.
pub fn test_config(auth_url: &str, backend_url: &str) -> AppConfig {
    AppConfig {
        mode: RuntimeMode::Local,
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_seconds: 30,
        },
        auth: AuthProviderConfig {
            base_url: auth_url.to_string(),
            api_key: if auth_url.is_empty() { String::new() } else { "test-key".to_string() },
            service_role_key: String::new(),
            request_timeout_seconds: 5,
        },
        backend: BackendConfig {
            base_url: backend_url.to_string(),
            api_key: if backend_url.is_empty() { String::new() } else { "test-key".to_string() },
            request_timeout_seconds: 5,
        },
        rate_limit: RateLimitConfig { cooldown_seconds: 60 },
        logging: LoggingConfig { level: "debug".to_string(), format: "pretty".to_string() },
    }
}

pub struct TestApp {
    pub router: Router,
}

impl TestApp {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Build the full application stack against test-double URLs.
    pub fn spawn(config: &AppConfig) -> Self {
        let state = tabletop_platform_service::infrastructure::http::build_app_state(config);
        Self::new(create_app(config, state))
    }

    /// Like `spawn`, but with a caller-supplied guard so tests can control
    /// the cooldown window.
    pub fn spawn_with_cooldown(config: &AppConfig, cooldown: Duration) -> Self {
        let base = tabletop_platform_service::infrastructure::http::build_app_state(config);
        let state = AppState {
            auth: base.auth,
            backend: base.backend,
            guard: RateLimitGuard::with_cooldown(cooldown),
        };
        Self::new(create_app(config, state))
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .uri(path)
            .method("GET")
            .body(Body::empty())
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        TestResponse::new(response).await
    }

    pub async fn get_with_cookies(&self, path: &str, cookie_header: &str) -> TestResponse {
        let request = Request::builder()
            .uri(path)
            .method("GET")
            .header(header::COOKIE, cookie_header)
            .body(Body::empty())
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        TestResponse::new(response).await
    }

    pub async fn post(&self, path: &str, body: Body) -> TestResponse {
        let request = Request::builder()
            .uri(path)
            .method("POST")
            .header("content-type", "application/json")
            .body(body)
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        TestResponse::new(response).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    async fn new(response: axum::response::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();

        Self { status, headers, body }
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(self.status, expected, "Response body: {}", self.body);
    }

    /// All `Set-Cookie` header values on the response.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    pub fn json<T>(&self) -> T
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_str(&self.body).unwrap()
    }
}
