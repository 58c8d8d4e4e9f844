// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mocked Kubernetes API and an in-memory secret backend.

use crate::backend::SecretBackend;
use crate::error::{Result as VaultlinkResult, VaultlinkError};
use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

type ResponseQueue = VecDeque<(u16, String)>;

/// A request seen by [`MockService`]
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// A mock HTTP service that returns predefined responses based on request
/// paths. Several responses for the same route are served in order; the
/// last one keeps being served once the queue is drained.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), ResponseQueue>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back((status, body.to_string()));
        self
    }

    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let mut responses = self.responses.lock().unwrap();

        let key = (method.to_string(), path.to_string());
        let key = if responses.contains_key(&key) {
            Some(key)
        } else {
            // Prefix match for paths like /api/v1/namespaces/foo
            responses
                .keys()
                .find(|(m, p)| m == method && path.starts_with(p.as_str()))
                .cloned()
        }?;

        let queue = responses.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let body = req.into_body().collect().await?.to_bytes();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                body: String::from_utf8_lossy(&body).to_string(),
            });

            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("resource", "unknown")));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock namespace JSON response
pub fn namespace_json(
    name: &str,
    phase: &str,
    resource_version: &str,
    annotations: &[(&str, &str)],
) -> String {
    let annotations: BTreeMap<&str, &str> = annotations.iter().copied().collect();
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid",
            "resourceVersion": resource_version,
            "annotations": annotations
        },
        "status": {
            "phase": phase
        }
    })
    .to_string()
}

/// Create a Status response for an API error
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    status_json(404, "NotFound", &format!("{} \"{}\" not found", resource, name))
}

/// Create a 409 conflict response for an optimistic-concurrency failure
pub fn conflict_json(resource: &str, name: &str) -> String {
    status_json(
        409,
        "Conflict",
        &format!(
            "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
            resource, name
        ),
    )
}

/// Objects held by [`FakeBackend`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FakeBackendState {
    /// Auth mounts by path, with their accessor
    pub mounts: BTreeMap<String, String>,
    pub policies: BTreeMap<String, String>,
    /// Everything written through `write`, by path
    pub objects: BTreeMap<String, Value>,
    /// Identity groups by name, with their id
    pub groups: BTreeMap<String, String>,
    /// Group aliases by name, with their canonical group id
    pub aliases: BTreeMap<String, String>,
}

/// An in-memory secret backend with the mount, policy and identity
/// semantics the binding orchestrator relies on.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeBackendState>,
    failing: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
    counter: Mutex<u32>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend with a single-sign-on auth method already mounted
    pub fn with_sso_mount(mount: &str) -> Self {
        let backend = Self::new();
        backend
            .state
            .lock()
            .unwrap()
            .mounts
            .insert(mount.to_string(), format!("auth_okta_{}", mount));
        backend
    }

    /// Fail every request whose path starts with `path`
    pub fn fail_on(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn state(&self) -> FakeBackendState {
        self.state.lock().unwrap().clone()
    }

    /// Mutating calls received so far as `METHOD path`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &str, path: &str) -> VaultlinkResult<()> {
        self.calls.lock().unwrap().push(format!("{} {}", method, path));
        let failing = self.failing.lock().unwrap();
        if failing.iter().any(|f| path.starts_with(f.as_str())) {
            return Err(backend_error(path, 500, "injected failure"));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("{}-{}", prefix, counter)
    }
}

fn backend_error(path: &str, status: u16, message: &str) -> VaultlinkError {
    VaultlinkError::BackendError {
        path: path.to_string(),
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl SecretBackend for FakeBackend {
    fn address(&self) -> &str {
        "https://vault.test:8200"
    }

    async fn enable_auth(&self, path: &str, kind: &str) -> VaultlinkResult<()> {
        let api_path = format!("sys/auth/{}", path);
        self.record("POST", &api_path)?;
        let accessor = self.next_id(&format!("auth_{}", kind));
        let mut state = self.state.lock().unwrap();
        if state.mounts.contains_key(path) {
            return Err(backend_error(&api_path, 400, "path is already in use"));
        }
        state.mounts.insert(path.to_string(), accessor);
        Ok(())
    }

    async fn disable_auth(&self, path: &str) -> VaultlinkResult<()> {
        let api_path = format!("sys/auth/{}", path);
        self.record("DELETE", &api_path)?;
        let mut state = self.state.lock().unwrap();
        if state.mounts.remove(path).is_none() {
            return Err(backend_error(&api_path, 400, "no matching mount"));
        }
        let prefix = format!("auth/{}/", path);
        state.objects.retain(|p, _| !p.starts_with(&prefix));
        Ok(())
    }

    async fn put_policy(&self, name: &str, rules: &str) -> VaultlinkResult<()> {
        self.record("PUT", &format!("sys/policies/acl/{}", name))?;
        self.state
            .lock()
            .unwrap()
            .policies
            .insert(name.to_string(), rules.to_string());
        Ok(())
    }

    async fn delete_policy(&self, name: &str) -> VaultlinkResult<()> {
        self.record("DELETE", &format!("sys/policies/acl/{}", name))?;
        self.state.lock().unwrap().policies.remove(name);
        Ok(())
    }

    async fn write(&self, path: &str, data: Value) -> VaultlinkResult<Option<Value>> {
        self.record("POST", path)?;

        if path == "identity/group" {
            let name = data["name"].as_str().unwrap_or_default().to_string();
            let existing = self.state.lock().unwrap().groups.get(&name).cloned();
            if existing.is_some() {
                // Updating by name answers with an empty body
                return Ok(None);
            }
            let id = self.next_id("group");
            self.state.lock().unwrap().groups.insert(name.clone(), id.clone());
            return Ok(Some(json!({ "data": { "id": id, "name": name } })));
        }

        let mut state = self.state.lock().unwrap();

        if path == "identity/group-alias" {
            let name = data["name"].as_str().unwrap_or_default().to_string();
            let canonical_id = data["canonical_id"].as_str().unwrap_or_default().to_string();
            if !state.groups.values().any(|id| *id == canonical_id) {
                return Err(backend_error(path, 400, "invalid canonical ID"));
            }
            if state.aliases.contains_key(&name) {
                return Err(backend_error(
                    path,
                    400,
                    "combination of mount and group alias name is already in use",
                ));
            }
            state.aliases.insert(name.clone(), canonical_id);
            return Ok(Some(json!({ "data": { "id": format!("alias-{}", name) } })));
        }

        if let Some(rest) = path.strip_prefix("auth/") {
            let mounted = state
                .mounts
                .keys()
                .any(|m| rest.starts_with(&format!("{}/", m)));
            if !mounted {
                return Err(backend_error(path, 404, "no handler for route"));
            }
        }

        state.objects.insert(path.to_string(), data);
        Ok(None)
    }

    async fn read(&self, path: &str) -> VaultlinkResult<Option<Value>> {
        {
            let failing = self.failing.lock().unwrap();
            if failing.iter().any(|f| path.starts_with(f.as_str())) {
                return Err(backend_error(path, 500, "injected failure"));
            }
        }

        let state = self.state.lock().unwrap();
        if path == "sys/auth" {
            let data: serde_json::Map<String, Value> = state
                .mounts
                .iter()
                .map(|(m, accessor)| (format!("{}/", m), json!({ "accessor": accessor, "type": "test" })))
                .collect();
            return Ok(Some(json!({ "data": data })));
        }

        if let Some(name) = path.strip_prefix("identity/group/name/") {
            return Ok(state
                .groups
                .get(name)
                .map(|id| json!({ "data": { "id": id, "name": name } })));
        }

        Ok(state.objects.get(path).cloned())
    }

    async fn delete(&self, path: &str) -> VaultlinkResult<()> {
        self.record("DELETE", path)?;
        let mut state = self.state.lock().unwrap();

        if let Some(name) = path.strip_prefix("identity/group/name/") {
            if let Some(id) = state.groups.remove(name) {
                state.aliases.retain(|_, canonical| *canonical != id);
            }
            return Ok(());
        }

        state.objects.remove(path);
        Ok(())
    }

    async fn ping(&self) -> VaultlinkResult<()> {
        let failing = self.failing.lock().unwrap();
        if failing.contains("sys/health") {
            return Err(backend_error("sys/health", 503, "Vault is sealed"));
        }
        Ok(())
    }
}
