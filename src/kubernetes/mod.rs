// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for namespace markers, service account credentials and RBAC.

pub mod credentials;
pub mod namespaces;
pub mod rbac;

pub use credentials::{service_account_credentials, ServiceAccountCredentials};
pub use namespaces::NamespaceMarker;
