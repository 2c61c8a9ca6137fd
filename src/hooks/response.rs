use serde_json::{Map, Value};

use crate::mapper::value_kind;
use crate::pipeline::{Command, ExecutionError, Flow};

/// Stash the current response body under `key`
pub fn save_response_body_to_cache(key: &str) -> Command {
    let key = key.to_string();
    Command::new(format!("save_response_body_to_cache({})", key), move |ctx| {
        let body = ctx.response.body.clone();
        ctx.cache(key.clone(), body);
        Ok(Flow::Continue)
    })
}

/// Replace the response body with the shallow union of cached fragments
///
/// Fragments are merged in the order given, so a later key wins on a field
/// name collision. Keys with nothing cached are skipped. A cached fragment
/// that is not an object is a fatal error.
pub fn merge_cached_values(keys: &[&str]) -> Command {
    let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    Command::new(format!("merge_cached_values({})", keys.join(",")), move |ctx| {
        let mut merged = Map::new();

        for key in &keys {
            match ctx.cached(key) {
                None => {
                    tracing::debug!(key = %key, "no cached fragment, skipping");
                }
                Some(Value::Object(fragment)) => {
                    for (field, value) in fragment {
                        merged.insert(field.clone(), value.clone());
                    }
                }
                Some(other) => {
                    return Err(ExecutionError::type_error_with_types(
                        format!("cached fragment '{}' cannot be merged", key),
                        "object",
                        value_kind(other),
                    ));
                }
            }
        }

        ctx.response.body = Value::Object(merged);
        Ok(Flow::Continue)
    })
}

/// Wrap the response body as `{field: body}`
pub fn nest_response_body(field: &str) -> Command {
    let field = field.to_string();
    Command::new(format!("nest_response_body({})", field), move |ctx| {
        let body = std::mem::take(&mut ctx.response.body);
        let mut wrapper = Map::new();
        wrapper.insert(field.clone(), body);
        ctx.response.body = Value::Object(wrapper);
        Ok(Flow::Continue)
    })
}

/// Prefix a storage key in the response body with the public image URL
///
/// Works on an object body or on each element of an array body. Empty and
/// missing fields are left alone. Running it twice prefixes twice.
pub fn tag_image_url(field: &str, base_url: &str) -> Command {
    let field = field.to_string();
    let base_url = base_url.trim_end_matches('/').to_string();
    Command::new(format!("tag_image_url({})", field), move |ctx| {
        match &mut ctx.response.body {
            Value::Object(map) => tag_field(map, &field, &base_url),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(map) = item {
                        tag_field(map, &field, &base_url);
                    }
                }
            }
            _ => {}
        }
        Ok(Flow::Continue)
    })
}

fn tag_field(map: &mut Map<String, Value>, field: &str, base_url: &str) {
    if let Some(Value::String(key)) = map.get_mut(field) {
        if !key.is_empty() {
            *key = format!("{}/{}", base_url, key);
        }
    }
}

/// Set the response status
pub fn set_status(status: u16) -> Command {
    Command::new(format!("set_status({})", status), move |ctx| {
        ctx.response.status = status;
        Ok(Flow::Continue)
    })
}

/// Remove fields from an object body, or from every object in an array body
pub fn strip_response_fields(fields: &[&str]) -> Command {
    let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    Command::new(format!("strip_response_fields({})", fields.join(",")), move |ctx| {
        let strip = |map: &mut Map<String, Value>| {
            for field in &fields {
                map.remove(field);
            }
        };
        match &mut ctx.response.body {
            Value::Object(map) => strip(map),
            Value::Array(items) => items.iter_mut().filter_map(Value::as_object_mut).for_each(strip),
            _ => {}
        }
        Ok(Flow::Continue)
    })
}

/// Copy a context value into the request body at a dotted field path
///
/// Intermediate objects are created as needed. Nothing happens when the
/// source path is absent.
pub fn copy_to_body(from_path: &str, target: &str) -> Command {
    let from_path = from_path.to_string();
    let target = target.to_string();
    Command::new(format!("copy_to_body({} -> {})", from_path, target), move |ctx| {
        let Some(value) = ctx.get_path(&from_path) else {
            return Ok(Flow::Continue);
        };

        let parts: Vec<&str> = target.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            return Ok(Flow::Continue);
        };

        let mut current = &mut ctx.body;
        for part in parents {
            let slot = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                return Err(ExecutionError::type_error_with_types(
                    format!("cannot set '{}' in body", target),
                    "object",
                    value_kind(slot),
                ));
            }
            current = match slot.as_object_mut() {
                Some(map) => map,
                None => return Ok(Flow::Continue),
            };
        }
        current.insert(last.to_string(), value);
        Ok(Flow::Continue)
    })
}
