// Copyright 2024-2026 kubectl-mtb Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes REST API probe.
//!
//! Talks to the API server with a bearer token. Tenant calls carry
//! `Impersonate-User` / `Impersonate-Group` headers, so the admin credentials
//! need the `impersonate` verb on users and groups.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use super::{object_name, AccessCheck, Caller, ClusterProbe, ObjectKind, ProbeError, WriteMode};

/// Resolved connection details for the API server.
///
/// Produced by the configuration layer; this module never reads kubeconfig.
#[derive(Debug, Clone)]
pub struct ClusterCredentials {
    /// Base URL, e.g. `https://10.0.0.1:443`.
    pub api_server: String,
    pub token: Option<String>,
    /// PEM-encoded CA bundle used to verify the API server.
    pub ca_pem: Option<Vec<u8>>,
    pub insecure_skip_tls_verify: bool,
    pub request_timeout: Duration,
}

impl ClusterCredentials {
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into(),
            token: None,
            ca_pem: None,
            insecure_skip_tls_verify: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// [`ClusterProbe`] backed by the Kubernetes REST API.
pub struct KubeApiProbe {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl KubeApiProbe {
    /// Build the HTTP client. Fails only on invalid TLS material.
    pub fn new(credentials: ClusterCredentials) -> Result<Self, ProbeError> {
        let mut builder = reqwest::Client::builder()
            .timeout(credentials.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(credentials.insecure_skip_tls_verify);

        if let Some(pem) = &credentials.ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| ProbeError::unknown(format!("invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| ProbeError::unknown(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base: credentials.api_server.trim_end_matches('/').to_string(),
            token: credentials.token,
        })
    }

    fn request(&self, method: Method, path: &str, caller: &Caller) -> RequestBuilder {
        let mut req = self.http.request(method, format!("{}{}", self.base, path));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Caller::Tenant(identity) = caller {
            req = req.header("Impersonate-User", identity.user.as_str());
            for group in &identity.groups {
                req = req.header("Impersonate-Group", group.as_str());
            }
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, ProbeError> {
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport_error)?;

        if status.is_success() {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&body)
                .map_err(|e| ProbeError::unknown(format!("malformed API response: {}", e)));
        }

        Err(status_error(status, &body))
    }
}

/// Path of the collection holding `kind` objects in `namespace`.
pub(crate) fn collection_path(namespace: &str, kind: ObjectKind) -> String {
    match kind.group() {
        "" => format!("/api/v1/namespaces/{}/{}", namespace, kind.resource()),
        _ => format!(
            "/apis/{}/namespaces/{}/{}",
            kind.api_version(),
            namespace,
            kind.resource()
        ),
    }
}

fn transport_error(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::timeout(err.to_string())
    } else {
        ProbeError::unknown(err.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> ProbeError {
    // API errors carry a `Status` object; fall back to the raw body.
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    ProbeError::from_status(status.as_u16(), message)
}

#[async_trait]
impl ClusterProbe for KubeApiProbe {
    async fn api_groups(&self) -> Result<Vec<String>, ProbeError> {
        let body = self.send(self.request(Method::GET, "/apis", &Caller::Admin)).await?;
        let mut groups = vec![String::new()];
        if let Some(list) = body.get("groups").and_then(Value::as_array) {
            groups.extend(
                list.iter()
                    .filter_map(|g| g.get("name").and_then(Value::as_str))
                    .map(str::to_string),
            );
        }
        Ok(groups)
    }

    async fn create_namespace(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<(), ProbeError> {
        let manifest = json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": name, "labels": labels },
        });
        let req = self
            .request(Method::POST, "/api/v1/namespaces", &Caller::Admin)
            .json(&manifest);
        self.send(req).await.map(|_| ())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ProbeError> {
        let req = self
            .request(Method::DELETE, &format!("/api/v1/namespaces/{}", name), &Caller::Admin)
            .query(&[("propagationPolicy", "Background")]);
        self.send(req).await.map(|_| ())
    }

    async fn create_object(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
        manifest: &Value,
        mode: WriteMode,
    ) -> Result<Value, ProbeError> {
        let mut req = self
            .request(Method::POST, &collection_path(namespace, kind), caller)
            .json(manifest);
        if mode == WriteMode::DryRun {
            req = req.query(&[("dryRun", "All")]);
        }
        tracing::trace!(%kind, namespace, name = ?object_name(manifest), "create object");
        self.send(req).await
    }

    async fn get_object(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
        name: &str,
    ) -> Result<Value, ProbeError> {
        let path = format!("{}/{}", collection_path(namespace, kind), name);
        self.send(self.request(Method::GET, &path, caller)).await
    }

    async fn list_objects(
        &self,
        caller: &Caller,
        namespace: &str,
        kind: ObjectKind,
    ) -> Result<Vec<Value>, ProbeError> {
        let body = self
            .send(self.request(Method::GET, &collection_path(namespace, kind), caller))
            .await?;
        Ok(body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_object(
        &self,
        namespace: &str,
        kind: ObjectKind,
        name: &str,
    ) -> Result<(), ProbeError> {
        let path = format!("{}/{}", collection_path(namespace, kind), name);
        self.send(self.request(Method::DELETE, &path, &Caller::Admin))
            .await
            .map(|_| ())
    }

    async fn access_review(&self, caller: &Caller, check: &AccessCheck) -> Result<bool, ProbeError> {
        let mut attributes = json!({
            "verb": check.verb,
            "resource": check.resource,
            "group": check.group,
        });
        if let Some(ns) = &check.namespace {
            attributes["namespace"] = json!(ns);
        }
        let review = json!({
            "apiVersion": "authorization.k8s.io/v1",
            "kind": "SelfSubjectAccessReview",
            "spec": { "resourceAttributes": attributes },
        });
        let req = self
            .request(
                Method::POST,
                "/apis/authorization.k8s.io/v1/selfsubjectaccessreviews",
                caller,
            )
            .json(&review);
        let body = self.send(req).await?;
        Ok(body
            .pointer("/status/allowed")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }
}
