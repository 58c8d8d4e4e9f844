// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Token review permission for bound service accounts

use crate::constants::{rbac, OPERATOR_NAME};
use crate::error::Result;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use kube::{
    api::{DeleteParams, ObjectMeta, PostParams},
    Api, Client,
};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

pub fn review_binding_name(namespace: &str, service_account: &str) -> String {
    format!("{}-{}-{}", namespace, service_account, rbac::BINDING_SUFFIX)
}

/// Grants `system:auth-delegator` to the namespace service account
pub fn review_binding(namespace: &str, service_account: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(review_binding_name(namespace, service_account)),
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/managed-by".to_string(),
                OPERATOR_NAME.to_string(),
            )])),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: rbac::AUTH_DELEGATOR_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: service_account.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

/// Create the token review binding; an existing binding is left alone
#[instrument(skip(client))]
pub async fn create_review_binding(client: &Client, namespace: &str, service_account: &str) -> Result<()> {
    let api: Api<ClusterRoleBinding> = Api::all(client.clone());
    let binding = review_binding(namespace, service_account);

    match api.create(&PostParams::default(), &binding).await {
        Ok(_) => {
            info!("Created ClusterRoleBinding {}", review_binding_name(namespace, service_account));
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 409 => {
            debug!("ClusterRoleBinding {} already exists", review_binding_name(namespace, service_account));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete the token review binding; a missing binding is not an error
#[instrument(skip(client))]
pub async fn delete_review_binding(client: &Client, namespace: &str, service_account: &str) -> Result<()> {
    let api: Api<ClusterRoleBinding> = Api::all(client.clone());
    let name = review_binding_name(namespace, service_account);

    match api.delete(&name, &DeleteParams::default()).await {
        Ok(_) => {
            info!("Deleted ClusterRoleBinding {}", name);
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            debug!("ClusterRoleBinding {} already gone", name);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{conflict_json, not_found_json, status_json, MockService};

    const BINDINGS_PATH: &str = "/apis/rbac.authorization.k8s.io/v1/clusterrolebindings";

    #[test]
    fn test_review_binding() {
        let binding = review_binding("team-a", "default");

        assert_eq!(binding.metadata.name.as_deref(), Some("team-a-default-tokenreview-binding"));
        assert_eq!(binding.role_ref.name, "system:auth-delegator");
        let subjects = binding.subjects.unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].kind, "ServiceAccount");
        assert_eq!(subjects[0].namespace.as_deref(), Some("team-a"));
    }

    #[tokio::test]
    async fn test_create_tolerates_existing_binding() {
        let mock = MockService::new().on_post(
            BINDINGS_PATH,
            409,
            &conflict_json("clusterrolebindings", "team-a-default-tokenreview-binding"),
        );

        create_review_binding(&mock.clone().into_client(), "team-a", "default")
            .await
            .unwrap();

        let posts = mock.requests_with_method("POST");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].json()["roleRef"]["name"], "system:auth-delegator");
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_binding() {
        let mock = MockService::new().on_delete(
            &format!("{}/team-a-default-tokenreview-binding", BINDINGS_PATH),
            404,
            &not_found_json("clusterrolebindings", "team-a-default-tokenreview-binding"),
        );

        delete_review_binding(&mock.into_client(), "team-a", "default")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_propagates_forbidden() {
        let mock = MockService::new().on_post(BINDINGS_PATH, 403, &status_json(403, "Forbidden", "forbidden"));

        let err = create_review_binding(&mock.into_client(), "team-a", "default")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(403));
    }
}
