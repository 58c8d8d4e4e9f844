// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use tokio::sync::Mutex;

/// Namespaces whose bind has been requested but not yet completed.
///
/// Entries are added when a namespace is created, before it may have
/// reached the Active phase, and removed once a bind fully succeeds.
#[derive(Debug, Default)]
pub struct PendingBinds {
    names: Mutex<HashSet<String>>,
}

impl PendingBinds {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, namespace: &str) {
        self.names.lock().await.insert(namespace.to_string());
    }

    /// Returns true if the namespace was pending
    pub async fn remove(&self, namespace: &str) -> bool {
        self.names.lock().await.remove(namespace)
    }

    pub async fn contains(&self, namespace: &str) -> bool {
        self.names.lock().await.contains(namespace)
    }

    pub async fn len(&self) -> usize {
        self.names.lock().await.len()
    }
}
