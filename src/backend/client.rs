// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the backend's `/v1` API

use crate::backend::types::{BackendResponseError, ErrorBody};
use crate::backend::SecretBackend;
use crate::error::{Result, VaultlinkError};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::Url;

const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    base: Url,
    address: String,
    token: Option<String>,
}

impl VaultClient {
    /// Create an unauthenticated client for `addr`
    pub fn new(addr: &Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vaultlink/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base: api_base(addr)?,
            address: addr.as_str().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Use `token` for every subsequent request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| VaultlinkError::ConfigError(format!("invalid backend path {}: {}", path, e)))
    }

    /// Issue a request with the client token
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Option<Value>> {
        self.request_with_token(method, path, body, self.token.as_deref()).await
    }

    /// Issue a request with an explicit token (login, unwrap)
    pub async fn request_with_token(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Result<Option<Value>> {
        let url = self.url(path)?;
        debug!("{} {}", method, url.path());

        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(VaultlinkError::BackendError {
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| BackendResponseError::new(path, format!("invalid JSON: {}", e)).into())
    }
}

/// `<addr>/v1/`, so relative paths join under the API root
fn api_base(addr: &Url) -> Result<Url> {
    let mut base = addr.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("v1/")
        .map_err(|e| VaultlinkError::ConfigError(format!("invalid backend address {}: {}", addr, e)))
}

fn error_message(status: StatusCode, text: &str) -> String {
    let errors = serde_json::from_str::<ErrorBody>(text)
        .map(|b| b.errors)
        .unwrap_or_default();
    if errors.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        errors.join("; ")
    }
}

#[async_trait]
impl SecretBackend for VaultClient {
    fn address(&self) -> &str {
        &self.address
    }

    #[instrument(skip(self))]
    async fn enable_auth(&self, path: &str, kind: &str) -> Result<()> {
        self.request(Method::POST, &format!("sys/auth/{}", path), Some(json!({ "type": kind })))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn disable_auth(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, &format!("sys/auth/{}", path), None)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, rules))]
    async fn put_policy(&self, name: &str, rules: &str) -> Result<()> {
        self.request(
            Method::PUT,
            &format!("sys/policies/acl/{}", name),
            Some(json!({ "policy": rules })),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_policy(&self, name: &str) -> Result<()> {
        self.request(Method::DELETE, &format!("sys/policies/acl/{}", name), None)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, data))]
    async fn write(&self, path: &str, data: Value) -> Result<Option<Value>> {
        self.request(Method::POST, path, Some(data)).await
    }

    #[instrument(skip(self))]
    async fn read(&self, path: &str) -> Result<Option<Value>> {
        match self.request(Method::GET, path, None).await {
            Err(e) if e.is_not_found() => Ok(None),
            other => other,
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path, None).await.map(|_| ())
    }

    async fn ping(&self) -> Result<()> {
        // standbyok: a standby node is healthy for our purposes
        self.request(Method::GET, "sys/health?standbyok=true", None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_without_trailing_slash() {
        let base = api_base(&Url::parse("https://vault.example.com:8200").unwrap()).unwrap();
        assert_eq!(base.as_str(), "https://vault.example.com:8200/v1/");
    }

    #[test]
    fn test_api_base_keeps_path_prefix() {
        let base = api_base(&Url::parse("https://proxy.example.com/vault").unwrap()).unwrap();
        assert_eq!(base.as_str(), "https://proxy.example.com/vault/v1/");
    }

    #[test]
    fn test_url_joins_nested_paths() {
        let client = VaultClient::new(&Url::parse("http://127.0.0.1:8200/").unwrap()).unwrap();
        let url = client.url("auth/k8s/prod/team-a/role/default").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8200/v1/auth/k8s/prod/team-a/role/default");
        assert_eq!(client.address(), "http://127.0.0.1:8200");
    }

    #[test]
    fn test_error_message_from_backend_errors() {
        let text = r#"{"errors":["path is already in use at k8s/prod/team-a/"]}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, text),
            "path is already in use at k8s/prod/team-a/"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "<html>"), "Bad Gateway");
    }
}
