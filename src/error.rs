// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::backend::types::BackendResponseError;
use crate::naming::TemplateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultlinkError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Backend transport error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Backend request {path} failed with status {status}: {message}")]
    BackendError {
        path: String,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    BackendResponse(#[from] BackendResponseError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Service account credentials unavailable: {0}")]
    CredentialsError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Namespace {name} not writable: {reason}")]
    NamespaceError { name: String, reason: String },
}

impl VaultlinkError {
    /// HTTP status of a failed backend or Kubernetes API call, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            VaultlinkError::KubeError(kube::Error::Api(resp)) => Some(resp.code),
            VaultlinkError::BackendError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for optimistic-concurrency conflicts on object writes
    pub fn is_conflict(&self) -> bool {
        matches!(self, VaultlinkError::KubeError(_)) && self.status() == Some(409)
    }

    /// Backend rejected a create because the object already exists
    pub fn is_already_in_use(&self) -> bool {
        matches!(self, VaultlinkError::BackendError { status: 400, message, .. } if message.contains("already in use"))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, VaultlinkError>;
