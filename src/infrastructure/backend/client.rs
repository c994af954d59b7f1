use crate::infrastructure::config::BackendConfig;
use anyhow::{anyhow, Context, Result};
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Client for the hosted database's REST surface.
///
/// Generic row operations keyed by table name and equality filter
/// predicates. The schema lives entirely in the hosted backend; this client
/// only moves `serde_json::Value` rows and surfaces failure messages the
/// rate-limit guard can classify.
#[derive(Debug, Clone)]
pub struct BackendClient {
    config: BackendConfig,
    http_client: HttpClient,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// An equality filter on one column, rendered as `column=eq.value`.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), value: value.into() }
    }
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(anyhow!("Backend base URL is required"));
        }
        if config.api_key.is_empty() {
            return Err(anyhow!("Backend API key is required"));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, http_client })
    }

    /// Select rows from a table matching all filters.
    pub async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, BackendError> {
        let response = self
            .request(reqwest::Method::GET, table, filters)
            .send()
            .await?;
        let rows: Vec<Value> = Self::into_result(response).await?.json().await?;
        debug!(table, rows = rows.len(), "backend select");
        Ok(rows)
    }

    /// Insert rows into a table, returning the inserted representation.
    pub async fn insert(&self, table: &str, rows: &Value) -> Result<Vec<Value>, BackendError> {
        let response = self
            .request(reqwest::Method::POST, table, &[])
            .header("prefer", "return=representation")
            .json(rows)
            .send()
            .await?;
        let inserted: Vec<Value> = Self::into_result(response).await?.json().await?;
        debug!(table, rows = inserted.len(), "backend insert");
        Ok(inserted)
    }

    /// Patch rows matching the filters.
    pub async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: &Value,
    ) -> Result<(), BackendError> {
        let response = self
            .request(reqwest::Method::PATCH, table, filters)
            .json(patch)
            .send()
            .await?;
        Self::into_result(response).await?;
        debug!(table, "backend update");
        Ok(())
    }

    /// Delete rows matching the filters.
    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), BackendError> {
        let response = self
            .request(reqwest::Method::DELETE, table, filters)
            .send()
            .await?;
        Self::into_result(response).await?;
        debug!(table, "backend delete");
        Ok(())
    }

    fn request(
        &self,
        http_method: reqwest::Method,
        table: &str,
        filters: &[Filter],
    ) -> reqwest::RequestBuilder {
        let url = format!("{}/rest/v1/{table}", self.config.base_url);
        let query: Vec<(String, String)> = filters
            .iter()
            .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
            .collect();

        self.http_client
            .request(http_method, &url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
            .query(&query)
    }

    /// Map a non-success response to an error whose message carries the
    /// status text, so 429 responses read as `429 Too Many Requests: ...`
    /// for the guard's signature matcher.
    async fn into_result(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = status.canonical_reason().unwrap_or("Unknown");
        Err(BackendError::Api {
            status: status.as_u16(),
            message: format!("{} {reason}: {body}", status.as_u16()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_ok};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            api_key: "test-backend-key".to_string(),
            request_timeout_seconds: 5,
        }
    }

    #[test]
    fn test_client_creation_requires_config() {
        assert_ok!(BackendClient::new(create_test_config("http://localhost:9998")));
        assert_err!(BackendClient::new(create_test_config("")));
    }

    #[test]
    fn test_filter_rendering() {
        let filter = Filter::eq("id", "42");
        assert_eq!(filter.column, "id");
        assert_eq!(filter.value, "42");
    }

    #[tokio::test]
    async fn test_select_with_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/polls"))
            .and(query_param("id", "eq.7"))
            .and(header("apikey", "test-backend-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": 7, "question": "Next game night?" }
            ])))
            .mount(&server)
            .await;

        let client = BackendClient::new(create_test_config(&server.uri())).unwrap();
        let rows = client.select("polls", &[Filter::eq("id", "7")]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["question"], "Next game night?");
    }

    #[tokio::test]
    async fn test_insert_returns_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/polls"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!([{ "id": 1, "question": "q" }])),
            )
            .mount(&server)
            .await;

        let client = BackendClient::new(create_test_config(&server.uri())).unwrap();
        let inserted =
            client.insert("polls", &serde_json::json!({ "question": "q" })).await.unwrap();
        assert_eq!(inserted[0]["id"], 1);
    }

    #[tokio::test]
    async fn test_429_surfaces_rate_limit_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/games"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = BackendClient::new(create_test_config(&server.uri())).unwrap();
        let err = client.select("games", &[]).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("429 Too Many Requests"));
        assert!(message.contains("slow down"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/memberships"))
            .and(query_param("user_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/memberships"))
            .and(query_param("user_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = BackendClient::new(create_test_config(&server.uri())).unwrap();
        let filters = [Filter::eq("user_id", "u1")];
        assert_ok!(
            client.update("memberships", &filters, &serde_json::json!({"role": "admin"})).await
        );
        assert_ok!(client.delete("memberships", &filters).await);
    }
}
