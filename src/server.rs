/// Local HTTP runtime
///
/// Serves every registered route key over axum. Each request is turned
/// into an [`ApiRequest`] and run by the synchronous [`Handler`] on tokio's
/// blocking pool. The caller identity is read from the `x-auth-user-id`
/// header.

use axum::extract::Query;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Json, Router};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::handler::{ApiRequest, Handler, ResponseEnvelope};
use crate::registry::{HttpMethod, RouteKey};

/// Header carrying the caller identity
pub const AUTH_USER_HEADER: &str = "x-auth-user-id";

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Patch => MethodFilter::PATCH,
    }
}

/// Extract `{name}` parameters by matching a path against a template
pub fn match_template(template: &str, path: &str) -> Option<HashMap<String, String>> {
    let template_segments: Vec<&str> = template.trim_matches('/').split('/').collect();
    let path_segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if template_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pattern, segment) in template_segments.iter().zip(path_segments) {
        match pattern.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(name) => {
                params.insert(name.to_string(), segment.to_string());
            }
            None if *pattern == segment => {}
            None => return None,
        }
    }
    Some(params)
}

/// Build the request the handler expects from HTTP parts
pub fn api_request(
    key: &RouteKey,
    uri: &Uri,
    query: HashMap<String, String>,
    headers: &HeaderMap,
    body: String,
) -> ApiRequest {
    let auth_user_id = headers
        .get(AUTH_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    ApiRequest {
        route_key: key.to_string(),
        path_parameters: match_template(&key.path, uri.path()).unwrap_or_default(),
        query_string_parameters: query,
        body: Some(body).filter(|b| !b.trim().is_empty()),
        auth_user_id,
    }
}

fn into_response(envelope: ResponseEnvelope) -> Response {
    let status = StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in &envelope.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
            headers.insert(name, value);
        }
    }
    (status, headers, Json(envelope.body)).into_response()
}

async fn serve_request(
    handler: Arc<Handler>,
    key: RouteKey,
    uri: Uri,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request = api_request(&key, &uri, query, &headers, body);
    match tokio::task::spawn_blocking(move || handler.handle(request)).await {
        Ok(envelope) => into_response(envelope),
        Err(err) => {
            tracing::error!(route = %key, error = %err, "handler task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal server error" })),
            )
                .into_response()
        }
    }
}

/// Build an axum router serving every route in the handler's registry
pub fn router(handler: Arc<Handler>) -> Router {
    let mut by_path: BTreeMap<String, Vec<RouteKey>> = BTreeMap::new();
    for key in handler.registry().route_keys() {
        by_path.entry(key.path.clone()).or_default().push(key);
    }

    let mut router = Router::new();
    for (path, keys) in by_path {
        let mut methods = MethodRouter::new();
        for key in keys {
            let handler = handler.clone();
            let filter = method_filter(key.method);
            methods = methods.on(
                filter,
                move |uri: Uri, Query(query): Query<HashMap<String, String>>, headers: HeaderMap, body: String| {
                    serve_request(handler.clone(), key.clone(), uri, query, headers, body)
                },
            );
        }
        router = router.route(&path, methods);
    }
    router
}

/// Serve until the process is stopped
pub async fn serve(addr: SocketAddr, handler: Arc<Handler>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, routes = handler.registry().len(), "listening");
    axum::serve(listener, router(handler)).await
}
