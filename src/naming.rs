// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Renders backend object names from the configured templates.
//!
//! Templates use minijinja syntax with three variables: `cluster`,
//! `namespace` and `service_account`. Rendered names end up as backend
//! path segments, so both the inputs and the output are checked before a
//! name is handed out.

use crate::config::Config;
use minijinja::{context, Environment, UndefinedBehavior};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("{kind} template is invalid: {source}")]
    Syntax {
        kind: TemplateKind,
        #[source]
        source: minijinja::Error,
    },

    #[error("{kind} template failed to render: {source}")]
    Render {
        kind: TemplateKind,
        #[source]
        source: minijinja::Error,
    },

    #[error("{field} {value:?} cannot be used in a backend path")]
    InvalidInput { field: &'static str, value: String },

    #[error("{kind} template rendered an unsafe backend path {rendered:?}")]
    InvalidPath { kind: TemplateKind, rendered: String },

    #[error("{kind} template does not depend on the namespace")]
    NotNamespaceScoped { kind: TemplateKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Auth,
    Policy,
    SecretsPath,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [TemplateKind::Auth, TemplateKind::Policy, TemplateKind::SecretsPath];

    /// Secret paths may use the backend's glob characters
    fn allows_globs(self) -> bool {
        matches!(self, TemplateKind::SecretsPath)
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateKind::Auth => "auth",
            TemplateKind::Policy => "policy",
            TemplateKind::SecretsPath => "secrets-path",
        };
        f.write_str(name)
    }
}

/// Identity a set of backend names is rendered for
#[derive(Debug, Clone, Copy)]
pub struct NameContext<'a> {
    pub cluster: &'a str,
    pub namespace: &'a str,
    pub service_account: &'a str,
}

pub struct NamingTemplates {
    env: Environment<'static>,
    auth: String,
    policy: String,
    secrets_path: String,
}

impl NamingTemplates {
    /// Compile and validate the three templates. Any error here is a
    /// configuration error.
    pub fn new(auth: &str, policy: &str, secrets_path: &str) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        let templates = Self {
            env,
            auth: auth.to_string(),
            policy: policy.to_string(),
            secrets_path: secrets_path.to_string(),
        };
        templates.validate()?;
        Ok(templates)
    }

    pub fn from_config(config: &Config) -> Result<Self, TemplateError> {
        Self::new(
            &config.auth_template,
            &config.policy_template,
            &config.secrets_path_template,
        )
    }

    fn source(&self, kind: TemplateKind) -> &str {
        match kind {
            TemplateKind::Auth => &self.auth,
            TemplateKind::Policy => &self.policy,
            TemplateKind::SecretsPath => &self.secrets_path,
        }
    }

    /// Render one template for the given identity
    pub fn render(&self, kind: TemplateKind, ctx: &NameContext<'_>) -> Result<String, TemplateError> {
        check_input("cluster", ctx.cluster)?;
        check_input("namespace", ctx.namespace)?;
        check_input("service account", ctx.service_account)?;

        let rendered = self
            .env
            .render_str(
                self.source(kind),
                context! {
                    cluster => ctx.cluster,
                    namespace => ctx.namespace,
                    service_account => ctx.service_account,
                },
            )
            .map_err(|source| TemplateError::Render { kind, source })?;

        let rendered = rendered.trim().to_string();
        if !is_safe_path(&rendered, kind.allows_globs()) {
            return Err(TemplateError::InvalidPath { kind, rendered });
        }
        Ok(rendered)
    }

    /// Syntax check plus sample renders. The secrets path has to differ per
    /// namespace, otherwise every namespace policy would grant the same path.
    fn validate(&self) -> Result<(), TemplateError> {
        for kind in TemplateKind::ALL {
            self.env
                .template_from_str(self.source(kind))
                .map_err(|source| TemplateError::Syntax { kind, source })?;
        }

        let first = NameContext {
            cluster: "cluster",
            namespace: "namespace-a",
            service_account: "default",
        };
        let second = NameContext {
            namespace: "namespace-b",
            ..first
        };

        for kind in TemplateKind::ALL {
            let a = self.render(kind, &first)?;
            let b = self.render(kind, &second)?;
            if kind == TemplateKind::SecretsPath && a == b {
                return Err(TemplateError::NotNamespaceScoped { kind });
            }
        }
        Ok(())
    }
}

fn check_input(field: &'static str, value: &str) -> Result<(), TemplateError> {
    let valid = !value.is_empty()
        && !value.contains('/')
        && !value.contains("..")
        && !value.chars().any(|c| c.is_whitespace() || c.is_control());
    if valid {
        Ok(())
    } else {
        Err(TemplateError::InvalidInput {
            field,
            value: value.to_string(),
        })
    }
}

fn is_safe_path(path: &str, allow_globs: bool) -> bool {
    if path.is_empty() {
        return false;
    }
    path.split('/').all(|segment| {
        !segment.is_empty()
            && segment != "."
            && segment != ".."
            && segment.chars().all(|c| {
                c.is_ascii_alphanumeric()
                    || matches!(c, '-' | '_' | '.')
                    || (allow_globs && matches!(c, '*' | '+'))
            })
    })
}
