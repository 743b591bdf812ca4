//! Shared JSON-over-HTTP plumbing.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secretary_core::error::ServiceError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// A base URL plus an authenticated reqwest client.
#[derive(Clone)]
pub struct ServiceClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ServiceClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Network(format!("HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    /// Join the base URL and a path that starts with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        debug!(url = %self.url(path), "GET");
        let response = send(self.request(Method::GET, path).query(query)).await?;
        decode(check_status(path, response).await?).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        debug!(url = %self.url(path), "POST");
        let response = send(self.request(Method::POST, path).json(body)).await?;
        decode(check_status(path, response).await?).await
    }

    /// POST where the response body is ignored.
    pub async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ServiceError> {
        debug!(url = %self.url(path), "POST");
        let response = send(self.request(Method::POST, path).json(body)).await?;
        check_status(path, response).await.map(|_| ())
    }

    /// DELETE; `Ok(false)` when the resource did not exist.
    pub async fn delete(&self, path: &str) -> Result<bool, ServiceError> {
        debug!(url = %self.url(path), "DELETE");
        let response = send(self.request(Method::DELETE, path)).await?;
        match check_status(path, response).await {
            Ok(_) => Ok(true),
            Err(ServiceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, ServiceError> {
    builder.send().await.map_err(|e| {
        if e.is_timeout() {
            ServiceError::Timeout(e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    })
}

async fn check_status(path: &str, response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(path, status, body))
}

fn status_error(path: &str, status: StatusCode, body: String) -> ServiceError {
    if status == StatusCode::NOT_FOUND {
        return ServiceError::NotFound(path.to_string());
    }
    warn!(status = status.as_u16(), path, "Service returned error");
    ServiceError::Http {
        status: status.as_u16(),
        message: body,
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ServiceError::Network(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
}
