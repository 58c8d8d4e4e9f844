// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle events consumed by the reconciler

use k8s_openapi::api::core::v1::{Namespace, Secret};

/// A change to one watched object
#[derive(Debug, Clone)]
pub enum ResourceEvent<K> {
    Created(K),
    Updated { old: K, new: K },
    Deleted(K),
}

impl<K> ResourceEvent<K> {
    /// The most recent state of the object
    pub fn object(&self) -> &K {
        match self {
            ResourceEvent::Created(obj) | ResourceEvent::Deleted(obj) => obj,
            ResourceEvent::Updated { new, .. } => new,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResourceEvent::Created(_) => "create",
            ResourceEvent::Updated { .. } => "update",
            ResourceEvent::Deleted(_) => "delete",
        }
    }
}

/// Events the watch adapters send to the reconciler
#[derive(Debug, Clone)]
pub enum ReconcileEvent {
    Namespace(ResourceEvent<Namespace>),
    Secret(ResourceEvent<Secret>),
}
