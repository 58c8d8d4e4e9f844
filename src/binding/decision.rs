// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pure bind/unbind decisions over observed namespace and secret state

use crate::constants::{annotations, secrets, PHASE_ACTIVE};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::ResourceExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Bind,
    Unbind,
    Ignore,
}

/// The namespace asks for (or already has) a binding
pub fn bind_requested(ns: &Namespace) -> bool {
    ns.annotations()
        .get(annotations::BIND)
        .is_some_and(|v| v == "true")
}

pub fn phase(ns: &Namespace) -> Option<&str> {
    ns.status.as_ref().and_then(|s| s.phase.as_deref())
}

pub fn is_active(ns: &Namespace) -> bool {
    phase(ns) == Some(PHASE_ACTIVE)
}

/// Single-sign-on group named by the operator, if any
pub fn identity_group(ns: &Namespace) -> Option<&str> {
    ns.annotations()
        .get(annotations::GROUP)
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
}

/// Service account a token secret belongs to
pub fn owning_service_account(secret: &Secret) -> Option<&str> {
    secret
        .annotations()
        .get(secrets::SERVICE_ACCOUNT_NAME_ANNOTATION)
        .map(String::as_str)
}

/// Decide what a namespace update requires. `pending` is true when a bind
/// was requested before the namespace could be bound.
pub fn on_namespace_update(old: &Namespace, new: &Namespace, pending: bool) -> Action {
    if old.resource_version() == new.resource_version() || !is_active(new) {
        return Action::Ignore;
    }

    match (bind_requested(old), bind_requested(new)) {
        (false, true) => Action::Bind,
        (true, true) if pending => Action::Bind,
        (true, false) => Action::Unbind,
        _ => Action::Ignore,
    }
}

/// Decide what a new token secret of `service_account` requires
pub fn on_secret_created(secret: &Secret, ns: &Namespace, service_account: &str) -> Action {
    if owning_service_account(secret) != Some(service_account) {
        return Action::Ignore;
    }
    if is_active(ns) && bind_requested(ns) {
        Action::Bind
    } else {
        Action::Ignore
    }
}

/// Decide what a deleted token secret of `service_account` requires
pub fn on_secret_deleted(secret: &Secret, ns: &Namespace, service_account: &str) -> Action {
    if owning_service_account(secret) != Some(service_account) {
        return Action::Ignore;
    }
    if is_active(ns) && bind_requested(ns) {
        Action::Unbind
    } else {
        Action::Ignore
    }
}
