/// Request boundary
///
/// The handler turns an inbound request into a [`Context`], runs the
/// registered sequence and encodes the result as a response envelope.
/// Fatal errors and panics are logged once here and answered with a
/// generic 500.

pub mod codec;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::executor::{MiddlewarePipeline, RunReport};
use crate::pipeline::{Context, ExecutionError};
use crate::registry::Registry;

/// An inbound request as delivered by the gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiRequest {
    /// `"METHOD /path/{param}"`
    pub route_key: String,
    pub path_parameters: HashMap<String, String>,
    pub query_string_parameters: HashMap<String, String>,
    /// Raw JSON body with camelCase keys
    pub body: Option<String>,
    /// Caller identity established by the authorizer
    pub auth_user_id: Option<String>,
}

/// The response returned to the gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

/// Runs requests against a registry
#[derive(Debug, Clone)]
pub struct Handler {
    registry: Arc<Registry>,
    headers: BTreeMap<String, String>,
}

impl Handler {
    pub fn new(registry: Arc<Registry>, config: &AppConfig) -> Self {
        Self {
            registry,
            headers: config.cors.headers(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle one request
    pub fn handle(&self, request: ApiRequest) -> ResponseEnvelope {
        let span = tracing::info_span!("request", route = %request.route_key);
        let _guard = span.enter();

        let body = match codec::decode_body(request.body.as_deref()) {
            Ok(body) => body,
            Err(capsule) => {
                tracing::warn!(message = %capsule.message, "rejected request body");
                return self.envelope(capsule.status, json!({ "message": capsule.message }));
            }
        };

        let mut context = Context::new(request.route_key).with_body(body);
        context.auth_user_id = request.auth_user_id;
        for (name, value) in request.path_parameters {
            context = context.with_path_param(name, value);
        }
        context.query = request.query_string_parameters;

        let pipeline = MiddlewarePipeline::new(&self.registry);
        let outcome = catch_unwind(AssertUnwindSafe(|| pipeline.dispatch(&mut context)));

        match outcome {
            Ok(Ok(report)) => {
                let short_circuited = matches!(report, RunReport::ShortCircuited { .. });
                tracing::info!(status = context.response.status, short_circuited, "request completed");
                let body = std::mem::take(&mut context.response.body);
                self.envelope(context.response.status, codec::encode(body))
            }
            Ok(Err(err)) => self.internal_error(&err),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                self.internal_error(&ExecutionError::custom(format!("command panicked: {}", message)))
            }
        }
    }

    fn internal_error(&self, err: &ExecutionError) -> ResponseEnvelope {
        tracing::error!(error = %err, "request failed");
        self.envelope(500, json!({ "message": "Internal server error" }))
    }

    fn envelope(&self, status_code: u16, body: Value) -> ResponseEnvelope {
        ResponseEnvelope {
            status_code,
            body,
            headers: self.headers.clone(),
        }
    }
}
