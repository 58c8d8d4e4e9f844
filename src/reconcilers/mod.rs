// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch adapters that feed namespace and secret events to the reconciler.

pub mod namespace;
pub mod secret;
pub mod tracker;

pub use namespace::NamespaceWatcher;
pub use secret::SecretWatcher;
pub use tracker::EventTracker;

use crate::binding::events::{ReconcileEvent, ResourceEvent};
use crate::binding::ReconcilerHandle;
use futures::StreamExt;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info, warn};

/// Watch `api` and forward lifecycle events until the stream ends
pub(crate) async fn forward_events<K>(
    api: Api<K>,
    config: watcher::Config,
    kind: &str,
    handle: ReconcilerHandle,
    wrap: fn(ResourceEvent<K>) -> ReconcileEvent,
) -> anyhow::Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
    K::DynamicType: Default,
{
    let mut tracker = EventTracker::new();
    let mut stream = std::pin::pin!(watcher(api, config).default_backoff());

    info!("Watching {} resources", kind);

    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => {
                for event in tracker.observe(event) {
                    debug!("Forwarding {} {} event", event.kind(), kind);
                    handle.send(wrap(event)).await;
                }
            }
            Err(e) => warn!(error = %e, "{} watch error, will retry", kind),
        }
    }

    warn!("{} watch stream ended", kind);
    Ok(())
}
