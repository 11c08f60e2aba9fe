//! Static service table: logical service name → backend base URL.
//!
//! Built once at startup from [`Config`](crate::config::Config) and only read
//! afterwards, so it is shared across request tasks without locking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("invalid base url for service '{name}': {reason}")]
    InvalidBaseUrl { name: String, reason: String },

    #[error("invalid service entry '{0}', expected name=url")]
    InvalidEntry(String),

    #[error("service '{0}' is registered twice")]
    Duplicate(String),
}

/// A backend service the gateway can route to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub base_url: String,
}

impl ServiceEndpoint {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }

    /// Human-readable label used to group operations in the docs UI,
    /// e.g. `auth` → `Auth Service`.
    pub fn display_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => format!("{}{} Service", first.to_uppercase(), chars.as_str()),
            None => "Service".to_string(),
        }
    }
}

pub fn default_services() -> Vec<ServiceEndpoint> {
    [
        ("auth", 8001),
        ("search", 8002),
        ("admin", 8003),
        ("profile", 8004),
        ("clinic", 8005),
        ("dentist", 8006),
        ("appointment", 8007),
        ("notification", 8008),
    ]
    .into_iter()
    .map(|(name, port)| ServiceEndpoint::new(name, format!("http://localhost:{}", port)))
    .collect()
}

/// Parse `auth=http://localhost:8001,search=http://localhost:8002`.
pub fn parse_service_table(table: &str) -> Result<Vec<ServiceEndpoint>, RegistryError> {
    table
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = entry
                .split_once('=')
                .ok_or_else(|| RegistryError::InvalidEntry(entry.to_string()))?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                return Err(RegistryError::InvalidEntry(entry.to_string()));
            }
            Ok(ServiceEndpoint::new(name, url))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: BTreeMap<String, ServiceEndpoint>,
    /// Configuration order, kept for deterministic docs merging.
    order: Vec<String>,
}

impl ServiceRegistry {
    /// Validates every base URL up front so a typo fails startup instead of a request.
    pub fn new(endpoints: Vec<ServiceEndpoint>) -> Result<Self, RegistryError> {
        let mut services = BTreeMap::new();
        let mut order = Vec::with_capacity(endpoints.len());

        for mut endpoint in endpoints {
            let parsed = Url::parse(&endpoint.base_url).map_err(|e| RegistryError::InvalidBaseUrl {
                name: endpoint.name.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(RegistryError::InvalidBaseUrl {
                    name: endpoint.name.clone(),
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
            endpoint.base_url = endpoint.base_url.trim_end_matches('/').to_string();

            if services.contains_key(&endpoint.name) {
                return Err(RegistryError::Duplicate(endpoint.name));
            }
            order.push(endpoint.name.clone());
            services.insert(endpoint.name.clone(), endpoint);
        }

        Ok(Self { services, order })
    }

    pub fn resolve(&self, name: &str) -> Result<&ServiceEndpoint, RegistryError> {
        self.services
            .get(name)
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))
    }

    /// Endpoints in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceEndpoint> {
        self.order.iter().filter_map(|name| self.services.get(name))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
