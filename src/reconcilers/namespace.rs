// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace watcher - forwards namespace lifecycle events to the reconciler.

use super::forward_events;
use crate::binding::events::ReconcileEvent;
use crate::binding::ReconcilerHandle;
use k8s_openapi::api::core::v1::Namespace;
use kube::runtime::watcher;
use kube::{Api, Client};

pub struct NamespaceWatcher {
    client: Client,
    handle: ReconcilerHandle,
}

impl NamespaceWatcher {
    pub fn new(client: Client, handle: ReconcilerHandle) -> Self {
        Self { client, handle }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client);
        forward_events(
            namespaces,
            watcher::Config::default(),
            "namespace",
            self.handle,
            ReconcileEvent::Namespace,
        )
        .await
    }
}
