use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::ErrorCapsule;

/// A key-value record, the internal shape of request and response payloads
pub type Record = Map<String, Value>;

/// Response under construction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: Value::Object(Map::new()),
        }
    }
}

/// Per-request state threaded through every command of a sequence
///
/// A context is created once per inbound request, owned by that request
/// and dropped when the handler returns.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub response: Response,
    /// Working request payload (snake_case keys)
    pub body: Record,
    pub auth_user_id: Option<String>,
    /// Identifier from the request path, if the route has one
    pub id: Option<String>,
    pub route_key: String,
    pub path_parameters: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Set when a command asks the executor to stop
    pub short_circuit: bool,
    error_capsule: Vec<ErrorCapsule>,
    cached_values: HashMap<String, Value>,
}

impl Context {
    /// Create a new context for the given route key
    pub fn new(route_key: impl Into<String>) -> Self {
        Self {
            route_key: route_key.into(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: Record) -> Self {
        self.body = body;
        self
    }

    pub fn with_auth_user(mut self, auth_user_id: impl Into<String>) -> Self {
        self.auth_user_id = Some(auth_user_id.into());
        self
    }

    /// Add a path parameter; the `id` parameter also populates `Context::id`
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == "id" {
            self.id = Some(value.clone());
        }
        self.path_parameters.insert(name, value);
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Append a capsule; the executor reports the most recent one
    pub fn push_capsule(&mut self, capsule: ErrorCapsule) {
        self.error_capsule.push(capsule);
    }

    pub(crate) fn pop_capsule(&mut self) -> Option<ErrorCapsule> {
        self.error_capsule.pop()
    }

    pub fn capsules(&self) -> &[ErrorCapsule] {
        &self.error_capsule
    }

    pub fn has_capsule(&self) -> bool {
        !self.error_capsule.is_empty()
    }

    /// Store a response fragment under a name
    pub fn cache(&mut self, key: impl Into<String>, value: Value) {
        self.cached_values.insert(key.into(), value);
    }

    pub fn cached(&self, key: &str) -> Option<&Value> {
        self.cached_values.get(key)
    }

    /// The caller's identity, or `None` when the request is anonymous or blank
    pub fn auth_user(&self) -> Option<&str> {
        self.auth_user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Get a value using a dotted path rooted at one of the context areas
    ///
    /// Supported roots:
    /// - `body.<field>...` - the working payload
    /// - `path.<name>` - path parameters
    /// - `query.<name>` - query string parameters
    /// - `response.<field>...` - the response body
    /// - `cache.<key>...` - cached fragments
    /// - `auth.user_id` - the caller's identity
    ///
    /// Nested objects and array indices are traversed as in
    /// `"body.deliverables.0.platform"`.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let root = parts.next()?;
        let rest: Vec<&str> = parts.collect();

        match root {
            "path" => lookup_flat(&self.path_parameters, &rest),
            "query" => lookup_flat(&self.query, &rest),
            "auth" => match rest.as_slice() {
                ["user_id"] => self.auth_user().map(|id| Value::String(id.to_string())),
                _ => None,
            },
            "body" => {
                let (first, tail) = rest.split_first()?;
                traverse(self.body.get(*first)?, tail).cloned()
            }
            "response" => traverse(&self.response.body, &rest).cloned(),
            "cache" => {
                let (first, tail) = rest.split_first()?;
                traverse(self.cached_values.get(*first)?, tail).cloned()
            }
            _ => None,
        }
    }

    /// Check if a path exists
    pub fn has_path(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }
}

fn lookup_flat(map: &HashMap<String, String>, rest: &[&str]) -> Option<Value> {
    match rest {
        [name] => map.get(*name).map(|v| Value::String(v.clone())),
        _ => None,
    }
}

fn traverse<'a>(mut current: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(*part)?,
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                arr.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}
