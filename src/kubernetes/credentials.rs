// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Service account token lookup for the backend token reviewer

use crate::constants::secrets;
use crate::error::{Result, VaultlinkError};
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::{api::ListParams, Api, Client, ResourceExt};
use tracing::{debug, info, instrument};

/// Token and cluster CA of a service account
pub struct ServiceAccountCredentials {
    pub token: String,
    pub ca_cert: String,
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("token", &"<redacted>")
            .field("ca_cert_len", &self.ca_cert.len())
            .finish()
    }
}

/// Resolve the token secret of `service_account` in `namespace`
#[instrument(skip(client))]
pub async fn service_account_credentials(
    client: &Client,
    namespace: &str,
    service_account: &str,
) -> Result<ServiceAccountCredentials> {
    let accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), namespace);
    let secrets_api: Api<Secret> = Api::namespaced(client.clone(), namespace);

    let account = accounts.get(service_account).await.map_err(|e| {
        VaultlinkError::CredentialsError(format!(
            "Failed to get service account {}/{}: {}",
            namespace, service_account, e
        ))
    })?;

    let linked = account
        .secrets
        .as_ref()
        .and_then(|refs| refs.iter().find_map(|r| r.name.clone()));

    let secret = match linked {
        Some(name) => {
            debug!("Using linked secret {}/{}", namespace, name);
            secrets_api.get(&name).await?
        }
        None => {
            let params = ListParams::default()
                .fields(&format!("type={}", secrets::SERVICE_ACCOUNT_TOKEN_TYPE));
            secrets_api
                .list(&params)
                .await?
                .items
                .into_iter()
                .find(|s| {
                    s.annotations()
                        .get(secrets::SERVICE_ACCOUNT_NAME_ANNOTATION)
                        .is_some_and(|sa| sa == service_account)
                })
                .ok_or_else(|| {
                    VaultlinkError::CredentialsError(format!(
                        "No token secret for service account {}/{}",
                        namespace, service_account
                    ))
                })?
        }
    };

    info!("Resolved token secret {}/{}", namespace, secret.name_any());
    credentials_from_secret(&secret)
}

/// Extract the token and CA certificate from a service account token secret
pub fn credentials_from_secret(secret: &Secret) -> Result<ServiceAccountCredentials> {
    let name = secret.name_any();
    let Some(data) = secret.data.as_ref() else {
        return Err(VaultlinkError::CredentialsError(format!(
            "Token secret {} has no data",
            name
        )));
    };

    let field = |key: &str| -> Result<Option<String>> {
        data.get(key)
            .map(|v| {
                String::from_utf8(v.0.clone()).map_err(|e| {
                    VaultlinkError::CredentialsError(format!(
                        "Failed to decode '{}' of token secret {}: {}",
                        key, name, e
                    ))
                })
            })
            .transpose()
    };

    let token = field(secrets::TOKEN_KEY)?.filter(|t| !t.is_empty()).ok_or_else(|| {
        VaultlinkError::CredentialsError(format!(
            "Token secret {} does not contain '{}' key",
            name,
            secrets::TOKEN_KEY
        ))
    })?;
    let ca_cert = field(secrets::CA_CERT_KEY)?.unwrap_or_default();

    Ok(ServiceAccountCredentials { token, ca_cert })
}
