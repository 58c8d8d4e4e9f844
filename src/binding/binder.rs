// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Binds namespaces against the live cluster and backend

use crate::backend::SecretBackend;
use crate::binding::decision;
use crate::binding::manager::NamespaceBinder;
use crate::binding::orchestrator::{BindRequest, BindingOrchestrator, StepReport, UnbindRequest};
use crate::error::Result;
use crate::kubernetes::{credentials, rbac, NamespaceMarker};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client, ResourceExt};
use tracing::{error, info, instrument};

pub struct KubeBinder<B> {
    client: Client,
    orchestrator: BindingOrchestrator<B>,
    marker: NamespaceMarker,
    cluster: String,
    service_account: String,
    kube_addr: String,
}

impl<B: SecretBackend> KubeBinder<B> {
    pub fn new(
        client: Client,
        orchestrator: BindingOrchestrator<B>,
        marker: NamespaceMarker,
        cluster: impl Into<String>,
        service_account: impl Into<String>,
        kube_addr: impl Into<String>,
    ) -> Self {
        Self {
            client,
            orchestrator,
            marker,
            cluster: cluster.into(),
            service_account: service_account.into(),
            kube_addr: kube_addr.into(),
        }
    }
}

#[async_trait]
impl<B: SecretBackend> NamespaceBinder for KubeBinder<B> {
    async fn fetch_namespace(&self, name: &str) -> Result<Namespace> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get(name).await?)
    }

    #[instrument(skip(self, ns), fields(namespace = %ns.name_any()))]
    async fn bind(&self, ns: &Namespace) -> Result<StepReport> {
        let namespace = ns.name_any();
        let creds =
            credentials::service_account_credentials(&self.client, &namespace, &self.service_account).await?;

        let bound = self
            .orchestrator
            .bind(&BindRequest {
                cluster: &self.cluster,
                namespace: &namespace,
                service_account: &self.service_account,
                kube_addr: &self.kube_addr,
                identity_group: decision::identity_group(ns),
                reviewer_token: &creds.token,
                ca_cert: &creds.ca_cert,
            })
            .await?;

        let review = rbac::create_review_binding(&self.client, &namespace, &self.service_account).await;
        if let Err(e) = &review {
            error!("Create token review binding for namespace:{} error:{}", namespace, e);
        }

        // Marked even when steps failed, the names are needed for teardown
        let marked = self.marker.set_bound(ns, &bound.info).await;
        match &marked {
            Ok(true) => info!("Namespace {} marked bound", namespace),
            Ok(false) => {}
            Err(e) => error!("Mark namespace:{} bound error:{}", namespace, e),
        }

        review?;
        marked?;
        Ok(bound.report)
    }

    #[instrument(skip(self, ns), fields(namespace = %ns.name_any()))]
    async fn unbind(&self, ns: &Namespace) -> Result<StepReport> {
        let namespace = ns.name_any();

        let report = self
            .orchestrator
            .unbind(&UnbindRequest {
                cluster: &self.cluster,
                namespace: &namespace,
                service_account: &self.service_account,
                identity_group: decision::identity_group(ns),
            })
            .await?;

        if let Err(e) = rbac::delete_review_binding(&self.client, &namespace, &self.service_account).await {
            error!("Delete token review binding for namespace:{} error:{}", namespace, e);
        }

        Ok(report)
    }

    async fn clear_bound(&self, ns: &Namespace) -> Result<()> {
        if self.marker.clear_bound(ns).await? {
            info!("Namespace {} markers cleared", ns.name_any());
        }
        Ok(())
    }
}
