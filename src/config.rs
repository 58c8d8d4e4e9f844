// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::defaults;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;
use url::Url;

/// How the operator obtains its backend credential at startup
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCredential {
    /// A token handed over directly (`VAULT_TOKEN`)
    Token(String),
    /// Exchange the local service account token at `auth/<mount>/login`
    KubernetesLogin {
        role: String,
        mount: String,
        token_path: PathBuf,
    },
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_addr: Url,
    pub credential: BackendCredential,
    /// The credential is a one-time wrapping token
    pub unwrap: bool,
    /// Cluster name rendered into backend object names
    pub cluster: String,
    /// Service account bound in every namespace
    pub service_account: String,
    /// Kubernetes API address the backend uses to review tokens
    pub kube_addr: String,
    pub auth_template: String,
    pub policy_template: String,
    pub secrets_path_template: String,
    /// Single-sign-on mount whose groups get the namespace policy
    pub sso_mount: String,
    pub health_port: u16,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let backend_addr = get("VAULT_ADDR").context("VAULT_ADDR environment variable not set")?;
        let backend_addr = Url::parse(&backend_addr)
            .with_context(|| format!("VAULT_ADDR is not a valid URL: {}", backend_addr))?;
        if !matches!(backend_addr.scheme(), "http" | "https") {
            bail!("VAULT_ADDR must be an http(s) URL, got {}", backend_addr);
        }

        let cluster = get("CLUSTER_NAME").context("CLUSTER_NAME environment variable not set")?;

        let credential = match get("VAULT_AUTH_PATH") {
            Some(auth_path) => {
                let (role, mount) = parse_auth_path(&auth_path)?;
                BackendCredential::KubernetesLogin {
                    role,
                    mount,
                    token_path: PathBuf::from(or_default("KUBE_TOKEN_PATH", defaults::KUBE_TOKEN_PATH)),
                }
            }
            None => BackendCredential::Token(get("VAULT_TOKEN").context(
                "no backend credential: set VAULT_TOKEN or VAULT_AUTH_PATH",
            )?),
        };

        let unwrap = parse_bool("VAULT_UNWRAP", get("VAULT_UNWRAP"))?;

        let health_port = match get("HEALTH_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("HEALTH_PORT is not a valid port: {}", port))?,
            None => defaults::HEALTH_PORT,
        };

        Ok(Config {
            backend_addr,
            credential,
            unwrap,
            cluster,
            service_account: or_default("SERVICE_ACCOUNT", defaults::SERVICE_ACCOUNT),
            kube_addr: or_default("KUBE_ADDR", defaults::KUBE_ADDR),
            auth_template: or_default("VAULT_AUTH_TEMPLATE", defaults::AUTH_TEMPLATE),
            policy_template: or_default("VAULT_POLICY_TEMPLATE", defaults::POLICY_TEMPLATE),
            secrets_path_template: or_default(
                "VAULT_SECRETS_PATH_TEMPLATE",
                defaults::SECRETS_PATH_TEMPLATE,
            ),
            sso_mount: or_default("SSO_MOUNT", defaults::SSO_MOUNT),
            health_port,
            log_level: or_default("VAULTLINK_LOG_LEVEL", defaults::LOG_LEVEL),
        })
    }
}

/// Split `role@mount`; a bare mount logs in with the `default` role
fn parse_auth_path(value: &str) -> Result<(String, String)> {
    let (role, mount) = match value.split_once('@') {
        Some((role, mount)) => (role, mount),
        None => ("default", value),
    };
    let mount = mount.trim_matches('/');
    if role.is_empty() || mount.is_empty() {
        return Err(anyhow!("VAULT_AUTH_PATH must look like role@mount, got {}", value));
    }
    Ok((role.to_string(), mount.to_string()))
}

fn parse_bool(key: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => bail!("{} must be true or false, got {}", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load(&[
            ("VAULT_ADDR", "https://vault.example.com:8200"),
            ("VAULT_TOKEN", "s.root"),
            ("CLUSTER_NAME", "prod-eu"),
        ])
        .unwrap();

        assert_eq!(config.credential, BackendCredential::Token("s.root".to_string()));
        assert_eq!(config.cluster, "prod-eu");
        assert_eq!(config.service_account, "default");
        assert_eq!(config.kube_addr, "https://kubernetes.default.svc");
        assert_eq!(config.secrets_path_template, "team/{{ namespace }}/*");
        assert_eq!(config.sso_mount, "okta");
        assert_eq!(config.health_port, 8080);
        assert!(!config.unwrap);
    }

    #[test]
    fn test_auth_path_with_role() {
        let config = load(&[
            ("VAULT_ADDR", "http://127.0.0.1:8200"),
            ("VAULT_AUTH_PATH", "vaultlink@k8s/admin"),
            ("CLUSTER_NAME", "dev"),
            ("KUBE_TOKEN_PATH", "/tmp/token"),
            ("VAULT_UNWRAP", "true"),
        ])
        .unwrap();

        assert_eq!(
            config.credential,
            BackendCredential::KubernetesLogin {
                role: "vaultlink".to_string(),
                mount: "k8s/admin".to_string(),
                token_path: PathBuf::from("/tmp/token"),
            }
        );
        assert!(config.unwrap);
    }

    #[test]
    fn test_auth_path_without_role_defaults_role() {
        assert_eq!(
            parse_auth_path("kubernetes").unwrap(),
            ("default".to_string(), "kubernetes".to_string())
        );
        assert!(parse_auth_path("role@").is_err());
    }

    #[test]
    fn test_missing_credential_is_error() {
        let err = load(&[("VAULT_ADDR", "http://vault:8200"), ("CLUSTER_NAME", "dev")]);
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_cluster_is_error() {
        let err = load(&[("VAULT_ADDR", "http://vault:8200"), ("VAULT_TOKEN", "t")]);
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_address_is_error() {
        let err = load(&[
            ("VAULT_ADDR", "vault:8200/not a url"),
            ("VAULT_TOKEN", "t"),
            ("CLUSTER_NAME", "dev"),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_bool_and_port() {
        let base = [
            ("VAULT_ADDR", "http://vault:8200"),
            ("VAULT_TOKEN", "t"),
            ("CLUSTER_NAME", "dev"),
        ];
        let mut with_unwrap = base.to_vec();
        with_unwrap.push(("VAULT_UNWRAP", "maybe"));
        assert!(load(&with_unwrap).is_err());

        let mut with_port = base.to_vec();
        with_port.push(("HEALTH_PORT", "http"));
        assert!(load(&with_port).is_err());
    }
}
