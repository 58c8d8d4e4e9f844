// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed backend responses.
//!
//! Every response the operator reads a field from has its own structure and
//! goes through [`decode`], which names the request path on failure.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unexpected backend response for {path}: {reason}")]
pub struct BackendResponseError {
    pub path: String,
    pub reason: String,
}

impl BackendResponseError {
    pub fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Decode a response body, treating a missing body as an error
pub fn decode<T: DeserializeOwned>(path: &str, body: Option<Value>) -> Result<T, BackendResponseError> {
    let body = body.ok_or_else(|| BackendResponseError::new(path, "empty response body"))?;
    serde_json::from_value(body).map_err(|e| BackendResponseError::new(path, e.to_string()))
}

/// `{"errors": [...]}` body of a failed request
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Response of a login or unwrap call
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub auth: AuthInfo,
}

#[derive(Debug, Deserialize)]
pub struct AuthInfo {
    pub client_token: String,
}

/// Response of `identity/group` and `identity/group/name/<name>`
#[derive(Debug, Deserialize)]
pub struct IdentityGroupResponse {
    pub data: IdentityGroup,
}

#[derive(Debug, Deserialize)]
pub struct IdentityGroup {
    pub id: String,
}

/// Response of `sys/auth`: mounts keyed by path with a trailing slash
#[derive(Debug, Deserialize)]
pub struct AuthMountsResponse {
    pub data: BTreeMap<String, AuthMount>,
}

#[derive(Debug, Deserialize)]
pub struct AuthMount {
    pub accessor: String,
}

impl AuthMountsResponse {
    /// Accessor of the mount at `path`
    pub fn accessor(&self, path: &str) -> Option<&str> {
        let key = format!("{}/", path.trim_matches('/'));
        self.data.get(&key).map(|m| m.accessor.as_str())
    }
}
