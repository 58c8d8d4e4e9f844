// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Namespace annotation keys managed by vaultlink
pub mod annotations {
    /// "true" when the namespace wants (or has) a backend binding
    pub const BIND: &str = "vault-link/bind";
    /// Address of the backend the namespace is bound to
    pub const BACKEND_ADDRESS: &str = "vault-link/backend-address";
    pub const AUTH_NAME: &str = "vault-link/auth-name";
    pub const POLICY_NAME: &str = "vault-link/policy-name";
    pub const POLICY_PATH: &str = "vault-link/policy-path";
    /// Operator supplied single-sign-on group to grant the namespace policy to
    pub const GROUP: &str = "vault-link/group";

    /// Keys written by SetBound and removed by ClearBound
    pub const MANAGED: [&str; 5] = [BIND, BACKEND_ADDRESS, AUTH_NAME, POLICY_NAME, POLICY_PATH];
}

/// The operator name, used as field manager and managed-by label
pub const OPERATOR_NAME: &str = "vaultlink";

/// Namespace phase in which annotation writes are allowed
pub const PHASE_ACTIVE: &str = "Active";

/// Service account token secrets
pub mod secrets {
    pub const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";
    pub const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";
    pub const TOKEN_KEY: &str = "token";
    pub const CA_CERT_KEY: &str = "ca.crt";
}

/// Token review permission granted to each bound service account
pub mod rbac {
    pub const AUTH_DELEGATOR_ROLE: &str = "system:auth-delegator";
    pub const BINDING_SUFFIX: &str = "tokenreview-binding";
}

/// Backend objects created during bind
pub mod backend {
    /// Auth method type of the per-namespace mount
    pub const AUTH_TYPE: &str = "kubernetes";
    /// TTL of tokens issued by the per-namespace role
    pub const ROLE_TOKEN_TTL: &str = "24h";
    /// Capabilities granted on the namespace secrets path
    pub const POLICY_CAPABILITIES: [&str; 5] = ["create", "read", "update", "delete", "list"];
}

/// Conflict retry on namespace annotation writes
pub mod retry {
    pub const CONFLICT_ATTEMPTS: u32 = 5;
    pub const CONFLICT_INITIAL_DELAY_MS: u64 = 10;
    pub const CONFLICT_MAX_DELAY_MS: u64 = 500;
}

/// Defaults for the configuration loaded from the environment
pub mod defaults {
    pub const SERVICE_ACCOUNT: &str = "default";
    pub const KUBE_ADDR: &str = "https://kubernetes.default.svc";
    pub const KUBE_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
    pub const AUTH_TEMPLATE: &str = "k8s/{{ cluster }}/{{ namespace }}";
    pub const POLICY_TEMPLATE: &str = "k8s/{{ cluster }}/{{ namespace }}";
    pub const SECRETS_PATH_TEMPLATE: &str = "team/{{ namespace }}/*";
    pub const SSO_MOUNT: &str = "okta";
    pub const HEALTH_PORT: u16 = 8080;
    pub const LOG_LEVEL: &str = "info";
    /// Capacity of the channel between watch adapters and the reconciler
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
}
