//! Merges the OpenAPI descriptions published by each backend into one
//! document whose paths match the gateway's `/api/<service>/...` routes.
//!
//! Unreachable or broken backends are skipped; the merge never fails as a
//! whole. Component definitions (schemas and friends) are merged by name and
//! the first service to define a name wins: later definitions with the same
//! name are dropped, not merged or overwritten.

use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Map, Value};

use crate::registry::ServiceEndpoint;

const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];
const DEFAULT_OPENAPI_VERSION: &str = "3.1.0";

/// A backend description that was fetched successfully.
#[derive(Debug, Clone)]
pub struct FetchedDescription {
    pub service: ServiceEndpoint,
    pub document: Value,
}

#[derive(Debug, Clone)]
pub struct MergedApiDescription {
    pub document: Value,
    /// Services whose description made it into `document`.
    pub included: Vec<String>,
    /// Services that could not be fetched.
    pub skipped: Vec<String>,
}

pub struct SpecAggregator {
    client: reqwest::Client,
    spec_path: String,
    title: String,
    timeout: Duration,
}

impl SpecAggregator {
    pub fn new(client: reqwest::Client, spec_path: &str, title: &str, timeout: Duration) -> Self {
        Self {
            client,
            spec_path: spec_path.to_string(),
            title: title.to_string(),
            timeout,
        }
    }

    pub fn spec_url(&self, service: &ServiceEndpoint) -> String {
        format!(
            "{}/{}",
            service.base_url.trim_end_matches('/'),
            self.spec_path.trim_start_matches('/')
        )
    }

    /// Fetch one backend's description. Non-2xx and non-JSON responses are errors.
    pub async fn fetch(&self, service: &ServiceEndpoint) -> anyhow::Result<Value> {
        let resp = self
            .client
            .get(self.spec_url(service))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let document: Value = resp.json().await?;
        if !document.is_object() {
            anyhow::bail!("description is not a JSON object");
        }
        Ok(document)
    }

    /// Fetch every service concurrently and merge what arrived, in the
    /// order `services` lists them.
    pub async fn aggregate<'a, I>(&self, services: I) -> MergedApiDescription
    where
        I: IntoIterator<Item = &'a ServiceEndpoint>,
    {
        let services: Vec<&ServiceEndpoint> = services.into_iter().collect();
        let results = join_all(services.iter().map(|s| self.fetch(s))).await;

        let mut fetched = Vec::with_capacity(services.len());
        let mut skipped = Vec::new();
        for (service, result) in services.into_iter().zip(results) {
            match result {
                Ok(document) => fetched.push(FetchedDescription {
                    service: service.clone(),
                    document,
                }),
                Err(e) => {
                    tracing::warn!(service = %service.name, "skipping API description: {:#}", e);
                    skipped.push(service.name.clone());
                }
            }
        }

        let mut merged = merge(&self.title, fetched);
        merged.skipped = skipped;
        merged
    }
}

/// `/login` for `auth` becomes `/api/auth/login`.
pub fn prefix_path(service: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("/api/{}{}", service, path)
    } else {
        format!("/api/{}/{}", service, path)
    }
}

fn tag_operations(path_item: &mut Value, service: &ServiceEndpoint, tag: &str) {
    let Some(item) = path_item.as_object_mut() else {
        return;
    };
    for method in HTTP_METHODS {
        let Some(op) = item.get_mut(*method).and_then(Value::as_object_mut) else {
            continue;
        };
        op.insert("tags".into(), json!([tag]));
        // operation ids must stay unique across the merged document
        if let Some(Value::String(id)) = op.get("operationId") {
            let id = format!("{}_{}", service.name, id);
            op.insert("operationId".into(), Value::String(id));
        }
    }
}

/// Merge fetched descriptions in order. Pure; does no I/O.
pub fn merge(title: &str, fetched: Vec<FetchedDescription>) -> MergedApiDescription {
    let openapi = fetched
        .iter()
        .find_map(|f| f.document.get("openapi").and_then(Value::as_str))
        .unwrap_or(DEFAULT_OPENAPI_VERSION)
        .to_string();

    let mut paths = Map::new();
    let mut components: Map<String, Value> = Map::new();
    let mut tags = Vec::new();
    let mut included = Vec::new();

    for FetchedDescription { service, mut document } in fetched {
        let tag = service.display_name();
        let description = document
            .pointer("/info/description")
            .cloned()
            .unwrap_or_else(|| Value::String(format!("Routes served by the {} backend", service.name)));
        tags.push(json!({ "name": tag, "description": description }));

        if let Some(Value::Object(source)) = document.get_mut("paths").map(Value::take) {
            for (path, mut item) in source {
                tag_operations(&mut item, &service, &tag);
                paths.insert(prefix_path(&service.name, &path), item);
            }
        }

        if let Some(Value::Object(source)) = document.get_mut("components").map(Value::take) {
            for (kind, definitions) in source {
                let Value::Object(definitions) = definitions else {
                    continue;
                };
                let target = components
                    .entry(kind.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                let Some(target) = target.as_object_mut() else {
                    continue;
                };
                for (name, definition) in definitions {
                    if target.contains_key(&name) {
                        tracing::debug!(
                            service = %service.name,
                            "components.{}.{} already defined, keeping the first",
                            kind,
                            name
                        );
                        continue;
                    }
                    target.insert(name, definition);
                }
            }
        }

        included.push(service.name);
    }

    let document = json!({
        "openapi": openapi,
        "info": { "title": title, "version": env!("CARGO_PKG_VERSION") },
        "paths": paths,
        "components": components,
        "tags": tags,
    });

    MergedApiDescription {
        document,
        included,
        skipped: Vec::new(),
    }
}
