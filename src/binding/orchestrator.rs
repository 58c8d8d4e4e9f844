// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ordered bind/unbind sequences against the secret backend.
//!
//! Each step is attempted even when an earlier one failed; every outcome is
//! collected into a [`StepReport`] so callers can see what did not converge.
//! Running a sequence again is safe: names are deterministic and the backend
//! treats re-writes as updates.

use crate::backend::types::{decode, AuthMountsResponse, BackendResponseError, IdentityGroupResponse};
use crate::backend::SecretBackend;
use crate::constants::backend::{AUTH_TYPE, POLICY_CAPABILITIES, ROLE_TOKEN_TTL};
use crate::error::{Result, VaultlinkError};
use crate::naming::{NameContext, NamingTemplates, TemplateError, TemplateKind};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Names produced by a bind, written back onto the namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindInfo {
    pub auth_name: String,
    pub policy_name: String,
    pub policy_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    EnableAuth,
    ConfigureAuth,
    WriteRole,
    WritePolicy,
    MapSsoGroup,
    WriteIdentityGroup,
    ResolveSsoAccessor,
    WriteGroupAlias,
    DisableAuth,
    DeletePolicy,
    DeleteSsoGroup,
    DeleteIdentityGroup,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::EnableAuth => "enable-auth",
            Step::ConfigureAuth => "configure-auth",
            Step::WriteRole => "write-role",
            Step::WritePolicy => "write-policy",
            Step::MapSsoGroup => "map-sso-group",
            Step::WriteIdentityGroup => "write-identity-group",
            Step::ResolveSsoAccessor => "resolve-sso-accessor",
            Step::WriteGroupAlias => "write-group-alias",
            Step::DisableAuth => "disable-auth",
            Step::DeletePolicy => "delete-policy",
            Step::DeleteSsoGroup => "delete-sso-group",
            Step::DeleteIdentityGroup => "delete-identity-group",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// The object was already in place from an earlier bind
    AlreadyApplied,
    Failed(String),
    /// Not attempted because a step it depends on failed
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: Step,
    pub path: String,
    pub outcome: Outcome,
}

/// Outcome of every step of one bind or unbind, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub steps: Vec<StepOutcome>,
}

impl StepReport {
    fn push(&mut self, step: Step, path: &str, result: Result<()>) {
        let outcome = match result {
            Ok(()) => Outcome::Applied,
            Err(e) => {
                error!(step = %step, path = %path, "Backend step failed: {}", e);
                Outcome::Failed(e.to_string())
            }
        };
        self.steps.push(StepOutcome {
            step,
            path: path.to_string(),
            outcome,
        });
    }

    /// Like `push`, but an "already in use" rejection counts as converged
    fn push_create(&mut self, step: Step, path: &str, result: Result<()>) {
        match result {
            Err(e) if e.is_already_in_use() => {
                debug!(step = %step, path = %path, "Already present: {}", e);
                self.steps.push(StepOutcome {
                    step,
                    path: path.to_string(),
                    outcome: Outcome::AlreadyApplied,
                });
            }
            result => self.push(step, path, result),
        }
    }

    fn skip(&mut self, step: Step, path: &str) {
        self.steps.push(StepOutcome {
            step,
            path: path.to_string(),
            outcome: Outcome::Skipped,
        });
    }

    /// Steps that failed or were skipped
    pub fn incomplete(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps
            .iter()
            .filter(|s| !matches!(s.outcome, Outcome::Applied | Outcome::AlreadyApplied))
    }

    pub fn is_complete(&self) -> bool {
        self.incomplete().next().is_none()
    }

    pub fn outcome(&self, step: Step) -> Option<&Outcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }
}

#[derive(Debug, Clone)]
pub struct BindReport {
    pub info: BindInfo,
    pub report: StepReport,
}

/// Everything a bind needs for one namespace
#[derive(Clone)]
pub struct BindRequest<'a> {
    pub cluster: &'a str,
    pub namespace: &'a str,
    pub service_account: &'a str,
    /// Kubernetes API address the backend reviews tokens against
    pub kube_addr: &'a str,
    pub identity_group: Option<&'a str>,
    /// Token the backend uses as its token reviewer credential
    pub reviewer_token: &'a str,
    pub ca_cert: &'a str,
}

impl BindRequest<'_> {
    fn names(&self) -> NameContext<'_> {
        NameContext {
            cluster: self.cluster,
            namespace: self.namespace,
            service_account: self.service_account,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnbindRequest<'a> {
    pub cluster: &'a str,
    pub namespace: &'a str,
    pub service_account: &'a str,
    pub identity_group: Option<&'a str>,
}

pub struct BindingOrchestrator<B> {
    backend: Arc<B>,
    templates: NamingTemplates,
    sso_mount: String,
}

impl<B: SecretBackend> BindingOrchestrator<B> {
    pub fn new(backend: Arc<B>, templates: NamingTemplates, sso_mount: impl Into<String>) -> Self {
        Self {
            backend,
            templates,
            sso_mount: sso_mount.into().trim_matches('/').to_string(),
        }
    }

    /// Render the three backend names for a namespace
    pub fn names(&self, ctx: &NameContext<'_>) -> std::result::Result<BindInfo, TemplateError> {
        Ok(BindInfo {
            auth_name: self.templates.render(TemplateKind::Auth, ctx)?,
            policy_name: self.templates.render(TemplateKind::Policy, ctx)?,
            policy_path: self.templates.render(TemplateKind::SecretsPath, ctx)?,
        })
    }

    #[instrument(skip(self, req), fields(namespace = %req.namespace))]
    pub async fn bind(&self, req: &BindRequest<'_>) -> std::result::Result<BindReport, TemplateError> {
        let info = self.names(&req.names())?;
        let mut report = StepReport::default();
        let auth = &info.auth_name;

        info!("Enabling auth path:{}", auth);
        let result = self.backend.enable_auth(auth, AUTH_TYPE).await;
        report.push_create(Step::EnableAuth, &format!("sys/auth/{}", auth), result);

        let config_path = format!("auth/{}/config", auth);
        info!("Configuring auth method:{}", config_path);
        let result = self
            .backend
            .write(
                &config_path,
                json!({
                    "token_reviewer_jwt": req.reviewer_token,
                    "kubernetes_host": req.kube_addr,
                    "kubernetes_ca_cert": req.ca_cert,
                }),
            )
            .await
            .map(|_| ());
        report.push(Step::ConfigureAuth, &config_path, result);

        let role_path = format!("auth/{}/role/{}", auth, req.service_account);
        info!("Configuring auth role:{}", role_path);
        let result = self
            .backend
            .write(
                &role_path,
                json!({
                    "bound_service_account_names": [req.service_account],
                    "bound_service_account_namespaces": [req.namespace],
                    "policies": [info.policy_name],
                    "token_num_uses": 0,
                    "token_ttl": ROLE_TOKEN_TTL,
                }),
            )
            .await
            .map(|_| ());
        report.push(Step::WriteRole, &role_path, result);

        info!("Configuring policy:{} path:{}", info.policy_name, info.policy_path);
        let result = self
            .backend
            .put_policy(&info.policy_name, &policy_rules(&info.policy_path))
            .await;
        report.push(
            Step::WritePolicy,
            &format!("sys/policies/acl/{}", info.policy_name),
            result,
        );

        if let Some(group) = req.identity_group.filter(|g| !g.is_empty()) {
            self.bind_group(group, &info.policy_name, &mut report).await;
        }

        if !report.is_complete() {
            warn!(
                "Bind of namespace {} incomplete, {} step(s) did not apply",
                req.namespace,
                report.incomplete().count()
            );
        }

        Ok(BindReport { info, report })
    }

    /// Grant the namespace policy to a single-sign-on group. The alias part
    /// needs the identity group id and the SSO accessor; if either cannot be
    /// obtained the remaining steps are skipped.
    async fn bind_group(&self, group: &str, policy_name: &str, report: &mut StepReport) {
        let sso_group_path = self.sso_group_path(group);
        info!("Configuring sso group mapping:{}", sso_group_path);
        let result = self
            .backend
            .write(&sso_group_path, json!({ "policies": [policy_name] }))
            .await
            .map(|_| ());
        report.push(Step::MapSsoGroup, &sso_group_path, result);

        let group_id = match self.ensure_identity_group(group, policy_name).await {
            Ok(id) => {
                report.push(Step::WriteIdentityGroup, "identity/group", Ok(()));
                id
            }
            Err(e) => {
                report.push(Step::WriteIdentityGroup, "identity/group", Err(e));
                report.skip(Step::ResolveSsoAccessor, "sys/auth");
                report.skip(Step::WriteGroupAlias, "identity/group-alias");
                return;
            }
        };

        let accessor = match self.sso_accessor().await {
            Ok(accessor) => {
                report.push(Step::ResolveSsoAccessor, "sys/auth", Ok(()));
                accessor
            }
            Err(e) => {
                report.push(Step::ResolveSsoAccessor, "sys/auth", Err(e));
                report.skip(Step::WriteGroupAlias, "identity/group-alias");
                return;
            }
        };

        info!("Aliasing group:{} to accessor:{}", group, accessor);
        let result = self
            .backend
            .write(
                "identity/group-alias",
                json!({
                    "name": group,
                    "mount_accessor": accessor,
                    "canonical_id": group_id,
                }),
            )
            .await
            .map(|_| ());
        report.push_create(Step::WriteGroupAlias, "identity/group-alias", result);
    }

    /// Create or update the external identity group and return its id
    async fn ensure_identity_group(&self, group: &str, policy_name: &str) -> Result<String> {
        let path = "identity/group";
        let body = self
            .backend
            .write(
                path,
                json!({
                    "name": group,
                    "type": "external",
                    "policies": [policy_name],
                }),
            )
            .await?;

        // An update of an existing group answers without a body
        let (path, body) = match body {
            Some(body) => (path.to_string(), Some(body)),
            None => {
                let by_name = format!("identity/group/name/{}", group);
                let body = self.backend.read(&by_name).await?;
                (by_name, body)
            }
        };

        let group: IdentityGroupResponse = decode(&path, body)?;
        Ok(group.data.id)
    }

    async fn sso_accessor(&self) -> Result<String> {
        let path = "sys/auth";
        let mounts: AuthMountsResponse = decode(path, self.backend.read(path).await?)?;
        mounts
            .accessor(&self.sso_mount)
            .map(str::to_string)
            .ok_or_else(|| {
                VaultlinkError::BackendResponse(BackendResponseError::new(
                    path,
                    format!("no auth mount {}", self.sso_mount),
                ))
            })
    }

    fn sso_group_path(&self, group: &str) -> String {
        format!("auth/{}/groups/{}", self.sso_mount, group)
    }

    #[instrument(skip(self, req), fields(namespace = %req.namespace))]
    pub async fn unbind(&self, req: &UnbindRequest<'_>) -> std::result::Result<StepReport, TemplateError> {
        let info = self.names(&NameContext {
            cluster: req.cluster,
            namespace: req.namespace,
            service_account: req.service_account,
        })?;
        let mut report = StepReport::default();

        info!("Disabling auth path:{}", info.auth_name);
        let result = self.backend.disable_auth(&info.auth_name).await;
        report.push(
            Step::DisableAuth,
            &format!("sys/auth/{}", info.auth_name),
            result,
        );

        info!("Deleting policy name:{}", info.policy_name);
        let result = self.backend.delete_policy(&info.policy_name).await;
        report.push(
            Step::DeletePolicy,
            &format!("sys/policies/acl/{}", info.policy_name),
            result,
        );

        if let Some(group) = req.identity_group.filter(|g| !g.is_empty()) {
            let sso_group_path = self.sso_group_path(group);
            info!("Deleting sso group mapping:{}", sso_group_path);
            let result = self.backend.delete(&sso_group_path).await;
            report.push(Step::DeleteSsoGroup, &sso_group_path, result);

            let identity_path = format!("identity/group/name/{}", group);
            info!("Deleting identity group:{}", identity_path);
            let result = self.backend.delete(&identity_path).await;
            report.push(Step::DeleteIdentityGroup, &identity_path, result);
        }

        Ok(report)
    }
}

/// ACL granting full access to `path` and nothing else
pub fn policy_rules(path: &str) -> String {
    let capabilities = POLICY_CAPABILITIES
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "path \"{}\" {{\n  capabilities = [{}]\n}}\n",
        path, capabilities
    )
}
