/// Route table and mapper, frozen after bootstrap
///
/// A [`Registry`] is assembled once with a [`RegistryBuilder`] and then only
/// read. Handlers share it through an `Arc`; it has no mutating API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::mapper::{MappingError, ObjectMapper};
use crate::pipeline::{ExecutionError, Sequence, SequenceBuilder, SequenceError};

/// Errors raised while assembling the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid route key '{0}', expected \"METHOD /path\"")]
    InvalidRouteKey(String),

    #[error("route '{0}' is registered twice")]
    DuplicateRoute(String),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// HTTP method enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            _ => Err(()),
        }
    }
}

/// A parsed route key such as `GET /brands/{id}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RouteKey {
    pub method: HttpMethod,
    /// Path template with `{name}` parameters
    pub path: String,
}

impl RouteKey {
    /// Names of the `{name}` parameters in the path, in order
    pub fn parameters(&self) -> Vec<&str> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
            .collect()
    }
}

impl FromStr for RouteKey {
    type Err = RegistryError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let invalid = || RegistryError::InvalidRouteKey(key.to_string());

        let (method, path) = key.trim().split_once(' ').ok_or_else(invalid)?;
        let method = method.parse::<HttpMethod>().map_err(|_| invalid())?;
        let path = path.trim();
        if !path.starts_with('/') || path.contains(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(RouteKey {
            method,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)
    }
}

#[derive(Debug, Clone)]
struct RouteEntry {
    key: RouteKey,
    sequence: Sequence,
}

/// Collects routes during bootstrap
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    mapper: Arc<ObjectMapper>,
    routes: BTreeMap<String, RouteEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapper(mut self, mapper: Arc<ObjectMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// The mapper routes are being built against
    pub fn mapper(&self) -> Arc<ObjectMapper> {
        self.mapper.clone()
    }

    /// Build `builder` and register it under `key`
    pub fn route(mut self, key: &str, builder: SequenceBuilder) -> Result<Self, RegistryError> {
        let key: RouteKey = key.parse()?;
        let canonical = key.to_string();
        if self.routes.contains_key(&canonical) {
            return Err(RegistryError::DuplicateRoute(canonical));
        }

        let sequence = builder.finish()?;
        tracing::debug!(route = %canonical, commands = sequence.len(), "route registered");
        self.routes.insert(canonical, RouteEntry { key, sequence });
        Ok(self)
    }

    pub fn build(self) -> Registry {
        tracing::info!(routes = self.routes.len(), "registry built");
        Registry {
            mapper: self.mapper,
            routes: self.routes,
        }
    }
}

/// The frozen route table and object mapper
#[derive(Debug)]
pub struct Registry {
    mapper: Arc<ObjectMapper>,
    routes: BTreeMap<String, RouteEntry>,
}

impl Registry {
    /// The sequence for a route key, if one is registered
    pub fn sequence(&self, route_key: &str) -> Option<&Sequence> {
        let canonical = route_key.parse::<RouteKey>().ok()?.to_string();
        self.routes.get(&canonical).map(|entry| &entry.sequence)
    }

    /// Every registered route key, sorted
    pub fn route_keys(&self) -> Vec<RouteKey> {
        self.routes.values().map(|entry| entry.key.clone()).collect()
    }

    pub fn mapper(&self) -> &ObjectMapper {
        &self.mapper
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
