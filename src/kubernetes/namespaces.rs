// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Binding markers on namespaces

use crate::binding::decision::is_active;
use crate::binding::orchestrator::BindInfo;
use crate::constants::annotations;
use crate::error::{Result, VaultlinkError};
use crate::retry::{retry_on_conflict, RetryConfig};
use k8s_openapi::api::core::v1::Namespace;
use kube::{api::PostParams, Api, Client, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Annotations recorded on a namespace once it is bound
pub fn bound_annotations(backend_address: &str, info: &BindInfo) -> BTreeMap<String, String> {
    BTreeMap::from([
        (annotations::BIND.to_string(), "true".to_string()),
        (annotations::BACKEND_ADDRESS.to_string(), backend_address.to_string()),
        (annotations::AUTH_NAME.to_string(), info.auth_name.clone()),
        (annotations::POLICY_NAME.to_string(), info.policy_name.clone()),
        (annotations::POLICY_PATH.to_string(), info.policy_path.clone()),
    ])
}

/// Apply `changes` to the annotations; `None` removes the key.
/// Returns true if anything changed.
fn apply_changes(ns: &mut Namespace, changes: &BTreeMap<String, Option<String>>) -> bool {
    let current = ns.annotations_mut();
    let mut changed = false;

    for (key, value) in changes {
        match value {
            Some(value) if current.get(key) != Some(value) => {
                current.insert(key.clone(), value.clone());
                changed = true;
            }
            None if current.contains_key(key) => {
                current.remove(key);
                changed = true;
            }
            _ => {}
        }
    }

    changed
}

/// Writes and clears the bound annotations with optimistic concurrency
pub struct NamespaceMarker {
    client: Client,
    backend_address: String,
    retry: RetryConfig,
}

impl NamespaceMarker {
    pub fn new(client: Client, backend_address: impl Into<String>) -> Self {
        Self {
            client,
            backend_address: backend_address.into(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Record backend address and generated names on an Active namespace.
    /// Returns false if the namespace was not Active or already marked.
    #[instrument(skip(self, ns, info), fields(namespace = %ns.name_any()))]
    pub async fn set_bound(&self, ns: &Namespace, info: &BindInfo) -> Result<bool> {
        let changes = bound_annotations(&self.backend_address, info)
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();
        self.update(ns, changes).await
    }

    /// Remove every operator-managed annotation from an Active namespace
    #[instrument(skip(self, ns), fields(namespace = %ns.name_any()))]
    pub async fn clear_bound(&self, ns: &Namespace) -> Result<bool> {
        let changes = annotations::MANAGED
            .iter()
            .map(|k| (k.to_string(), None))
            .collect();
        self.update(ns, changes).await
    }

    async fn update(&self, ns: &Namespace, changes: BTreeMap<String, Option<String>>) -> Result<bool> {
        let name = ns.name_any();
        if !is_active(ns) {
            debug!("Namespace {} is not Active, skipping annotation update", name);
            return Ok(false);
        }

        let api: Api<Namespace> = Api::all(self.client.clone());
        let api = &api;
        let name = name.as_str();
        let changes = &changes;

        retry_on_conflict(&self.retry, "update namespace annotations", move || async move {
            let mut latest = api.get(name).await?;
            if !is_active(&latest) {
                return Err(VaultlinkError::NamespaceError {
                    name: name.to_string(),
                    reason: "namespace left the Active phase".to_string(),
                });
            }
            if !apply_changes(&mut latest, changes) {
                debug!("Namespace {} annotations already up to date", name);
                return Ok(false);
            }
            api.replace(name, &PostParams::default(), &latest).await?;
            info!("Updated annotations on namespace {}", name);
            Ok(true)
        })
        .await
    }
}
