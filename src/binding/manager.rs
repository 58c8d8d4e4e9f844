// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciler: consumes namespace and secret lifecycle events one at a time
//! and drives bind/unbind for the affected namespace.

use crate::binding::decision::{self, Action};
use crate::binding::events::{ReconcileEvent, ResourceEvent};
use crate::binding::orchestrator::StepReport;
use crate::binding::pending::PendingBinds;
use crate::constants::defaults::EVENT_CHANNEL_CAPACITY;
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::ResourceExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// The side effects the reconciler drives for one namespace
#[async_trait]
pub trait NamespaceBinder: Send + Sync {
    /// Read the latest state of a namespace
    async fn fetch_namespace(&self, name: &str) -> Result<Namespace>;

    /// Bind the namespace to the backend and mark it bound
    async fn bind(&self, ns: &Namespace) -> Result<StepReport>;

    /// Remove the backend objects and token review permission of the namespace
    async fn unbind(&self, ns: &Namespace) -> Result<StepReport>;

    /// Remove the bound markers from the namespace
    async fn clear_bound(&self, ns: &Namespace) -> Result<()>;
}

/// Handle to send events to the Reconciler
#[derive(Clone)]
pub struct ReconcilerHandle {
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl ReconcilerHandle {
    pub async fn send(&self, event: ReconcileEvent) {
        if let Err(e) = self.event_tx.send(event).await {
            error!("Failed to send event to Reconciler: {}", e);
        }
    }
}

pub struct Reconciler<N> {
    binder: N,
    pending: PendingBinds,
    service_account: String,
    event_rx: mpsc::Receiver<ReconcileEvent>,
}

impl<N: NamespaceBinder> Reconciler<N> {
    pub fn new(binder: N, pending: PendingBinds, service_account: impl Into<String>) -> (Self, ReconcilerHandle) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let reconciler = Self {
            binder,
            pending,
            service_account: service_account.into(),
            event_rx,
        };

        (reconciler, ReconcilerHandle { event_tx })
    }

    pub fn pending(&self) -> &PendingBinds {
        &self.pending
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("Reconciler started, waiting for events...");

        while let Some(event) = self.event_rx.recv().await {
            self.handle(event).await;
        }

        warn!("Event channel closed, reconciler stopping");
        Ok(())
    }

    /// Process one event to completion
    pub async fn handle(&self, event: ReconcileEvent) {
        match event {
            ReconcileEvent::Namespace(event) => self.handle_namespace(event).await,
            ReconcileEvent::Secret(event) => self.handle_secret(event).await,
        }
    }

    async fn handle_namespace(&self, event: ResourceEvent<Namespace>) {
        let Some(name) = event.object().metadata.name.clone() else {
            warn!("Dropping namespace {} event without a name", event.kind());
            return;
        };
        debug!("Event: {} namespace {}", event.kind(), name);

        match event {
            ResourceEvent::Created(_) => {
                self.pending.insert(&name).await;
            }
            ResourceEvent::Updated { old, new } => {
                let pending = self.pending.contains(&name).await;
                match decision::on_namespace_update(&old, &new, pending) {
                    Action::Bind => self.bind(&new).await,
                    Action::Unbind => {
                        self.unbind(&new).await;
                        if let Err(e) = self.binder.clear_bound(&new).await {
                            error!("Clear namespace:{} error:{}", name, e);
                        }
                    }
                    Action::Ignore => {}
                }
            }
            ResourceEvent::Deleted(ns) => {
                self.pending.remove(&name).await;
                if decision::bind_requested(&ns) {
                    self.unbind(&ns).await;
                }
            }
        }
    }

    async fn handle_secret(&self, event: ResourceEvent<Secret>) {
        let secret = match &event {
            ResourceEvent::Created(secret) | ResourceEvent::Deleted(secret) => secret,
            ResourceEvent::Updated { .. } => return,
        };

        let Some(namespace) = secret.namespace() else {
            warn!("Dropping secret {} event for {} without a namespace", event.kind(), secret.name_any());
            return;
        };
        if decision::owning_service_account(secret) != Some(self.service_account.as_str()) {
            debug!("Ignoring secret {}/{}, not owned by {}", namespace, secret.name_any(), self.service_account);
            return;
        }
        debug!("Event: {} secret {}/{}", event.kind(), namespace, secret.name_any());

        let ns = match self.binder.fetch_namespace(&namespace).await {
            Ok(ns) => ns,
            Err(e) if e.is_not_found() => {
                debug!("Namespace {} is gone, ignoring secret event", namespace);
                return;
            }
            Err(e) => {
                error!("Get namespace:{} error:{}", namespace, e);
                return;
            }
        };

        let action = match event {
            ResourceEvent::Created(ref secret) => decision::on_secret_created(secret, &ns, &self.service_account),
            ResourceEvent::Deleted(ref secret) => decision::on_secret_deleted(secret, &ns, &self.service_account),
            ResourceEvent::Updated { .. } => Action::Ignore,
        };

        match action {
            Action::Bind => self.bind(&ns).await,
            Action::Unbind => self.unbind(&ns).await,
            Action::Ignore => {}
        }
    }

    #[instrument(skip(self, ns), fields(namespace = %ns.name_any()))]
    async fn bind(&self, ns: &Namespace) {
        let name = ns.name_any();
        info!("Bind namespace:{}", name);

        match self.binder.bind(ns).await {
            Ok(report) if report.is_complete() => {
                if self.pending.remove(&name).await {
                    debug!("Namespace {} no longer pending", name);
                }
            }
            Ok(report) => {
                // Stays pending so the next update of this namespace retries
                warn!(
                    "Namespace {} partially bound: {}",
                    name,
                    report
                        .incomplete()
                        .map(|s| format!("{} ({})", s.step, s.path))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.pending.insert(&name).await;
            }
            Err(e) => {
                error!("Bind namespace:{} error:{}", name, e);
                self.pending.insert(&name).await;
            }
        }
    }

    #[instrument(skip(self, ns), fields(namespace = %ns.name_any()))]
    async fn unbind(&self, ns: &Namespace) {
        let name = ns.name_any();
        info!("Unbind namespace:{}", name);

        match self.binder.unbind(ns).await {
            Ok(report) if !report.is_complete() => {
                warn!(
                    "Namespace {} partially unbound, {} step(s) did not apply",
                    name,
                    report.incomplete().count()
                );
            }
            Ok(_) => {}
            Err(e) => error!("Unbind namespace:{} error:{}", name, e),
        }
    }
}
