// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Secret watcher - forwards service account token secret events to the reconciler.

use super::forward_events;
use crate::binding::events::ReconcileEvent;
use crate::binding::ReconcilerHandle;
use crate::constants::secrets;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use kube_runtime::watcher::Config as WatcherConfig;

pub fn token_secret_selector() -> String {
    format!("type={}", secrets::SERVICE_ACCOUNT_TOKEN_TYPE)
}

pub struct SecretWatcher {
    client: Client,
    handle: ReconcilerHandle,
}

impl SecretWatcher {
    pub fn new(client: Client, handle: ReconcilerHandle) -> Self {
        Self { client, handle }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let secrets: Api<Secret> = Api::all(self.client);
        let config = WatcherConfig::default().fields(&token_secret_selector());

        forward_events(secrets, config, "secret", self.handle, ReconcileEvent::Secret).await
    }
}
