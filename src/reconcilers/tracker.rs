// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turns raw watch events into created/updated/deleted lifecycle events

use crate::binding::events::ResourceEvent;
use kube::runtime::watcher::Event;
use kube::{Resource, ResourceExt};
use std::collections::{HashMap, HashSet};

/// Remembers the last seen state of every object of one kind
pub struct EventTracker<K> {
    known: HashMap<String, K>,
    /// Keys seen during an in-progress re-list
    relisting: Option<HashSet<String>>,
}

impl<K> Default for EventTracker<K> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            relisting: None,
        }
    }
}

impl<K: Resource + Clone> EventTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    fn key(obj: &K) -> Option<String> {
        let name = obj.meta().name.as_ref()?;
        Some(match obj.namespace() {
            Some(ns) => format!("{}/{}", ns, name),
            None => name.clone(),
        })
    }

    fn apply(&mut self, obj: K) -> Option<ResourceEvent<K>> {
        let key = Self::key(&obj)?;
        if let Some(seen) = self.relisting.as_mut() {
            seen.insert(key.clone());
        }
        Some(match self.known.insert(key, obj.clone()) {
            Some(old) => ResourceEvent::Updated { old, new: obj },
            None => ResourceEvent::Created(obj),
        })
    }

    /// Feed one watch event, returning the lifecycle events it implies
    pub fn observe(&mut self, event: Event<K>) -> Vec<ResourceEvent<K>> {
        match event {
            Event::Apply(obj) | Event::InitApply(obj) => self.apply(obj).into_iter().collect(),
            Event::Delete(obj) => {
                if let Some(key) = Self::key(&obj) {
                    self.known.remove(&key);
                }
                vec![ResourceEvent::Deleted(obj)]
            }
            Event::Init => {
                self.relisting = Some(HashSet::new());
                Vec::new()
            }
            Event::InitDone => {
                let Some(seen) = self.relisting.take() else {
                    return Vec::new();
                };
                // Deleted while the watch was down
                let gone: Vec<String> = self
                    .known
                    .keys()
                    .filter(|k| !seen.contains(*k))
                    .cloned()
                    .collect();
                gone.into_iter()
                    .filter_map(|k| self.known.remove(&k))
                    .map(ResourceEvent::Deleted)
                    .collect()
            }
        }
    }
}
