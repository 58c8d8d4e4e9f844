// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Establishes the operator's own backend credential at startup

use crate::backend::types::{decode, AuthResponse};
use crate::backend::VaultClient;
use crate::config::{BackendCredential, Config};
use crate::error::{Result, VaultlinkError};
use reqwest::Method;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Return a client authenticated the way `config` asks for
#[instrument(skip(client, config))]
pub async fn authenticate(client: VaultClient, config: &Config) -> Result<VaultClient> {
    let token = match &config.credential {
        BackendCredential::Token(token) => {
            debug!("Using token from configuration");
            token.clone()
        }
        BackendCredential::KubernetesLogin {
            role,
            mount,
            token_path,
        } => kubernetes_login(&client, role, mount, token_path).await?,
    };

    let token = if config.unwrap {
        unwrap_token(&client, &token).await?
    } else {
        token
    };

    Ok(client.with_token(token))
}

async fn kubernetes_login(client: &VaultClient, role: &str, mount: &str, token_path: &Path) -> Result<String> {
    let jwt = tokio::fs::read_to_string(token_path).await.map_err(|e| {
        VaultlinkError::ConfigError(format!(
            "cannot read service account token at {}: {}",
            token_path.display(),
            e
        ))
    })?;

    let path = format!("auth/{}/login", mount);
    info!("Logging in at {} with role {}", path, role);

    let body = client
        .request_with_token(
            Method::POST,
            &path,
            Some(json!({ "role": role, "jwt": jwt.trim() })),
            None,
        )
        .await?;

    let auth: AuthResponse = decode(&path, body)?;
    Ok(auth.auth.client_token)
}

async fn unwrap_token(client: &VaultClient, wrapping_token: &str) -> Result<String> {
    let path = "sys/wrapping/unwrap";
    info!("Unwrapping backend token");

    let body = client
        .request_with_token(Method::POST, path, None, Some(wrapping_token))
        .await?;

    let auth: AuthResponse = decode(path, body)?;
    Ok(auth.auth.client_token)
}
