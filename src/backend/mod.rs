// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Secret backend access: the administrative operations the binding
//! orchestrator needs, an HTTP implementation, and startup login.

pub mod client;
pub mod login;
pub mod types;

pub use client::VaultClient;
pub use login::authenticate;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Administrative backend API. Paths are relative to the API root
/// (`sys/auth/...`, `auth/...`, `identity/...`).
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Address recorded on bound namespaces
    fn address(&self) -> &str;

    /// Enable an auth method of type `kind` at `path`
    async fn enable_auth(&self, path: &str, kind: &str) -> Result<()>;

    async fn disable_auth(&self, path: &str) -> Result<()>;

    async fn put_policy(&self, name: &str, rules: &str) -> Result<()>;

    async fn delete_policy(&self, name: &str) -> Result<()>;

    /// Write `data` to `path`, returning the response body if there was one
    async fn write(&self, path: &str, data: Value) -> Result<Option<Value>>;

    /// Read `path`; `None` when the object does not exist
    async fn read(&self, path: &str) -> Result<Option<Value>>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// Lightweight liveness probe
    async fn ping(&self) -> Result<()>;
}
