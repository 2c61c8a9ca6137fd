use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::short_type_name;
use crate::pipeline::{Command, ErrorCapsule, ExecutionError, Flow, Record};

/// Stop with `400 {}` unless the value at `path` is a UUID
///
/// `path` is a context path such as `"path.id"` or `"body.listing_id"`.
pub fn validate_uuid(path: &str) -> Command {
    let path = path.to_string();
    Command::new(format!("validate_uuid({})", path), move |ctx| {
        let valid = ctx
            .get_path(&path)
            .as_ref()
            .and_then(Value::as_str)
            .is_some_and(|candidate| Uuid::parse_str(candidate).is_ok());

        if valid {
            return Ok(Flow::Continue);
        }

        tracing::debug!(path = %path, "rejecting malformed identifier");
        ctx.response.status = 400;
        ctx.response.body = json!({});
        Ok(Flow::Halt)
    })
}

/// Require a caller identity
pub fn require_auth_user() -> Command {
    Command::new("require_auth_user", |ctx| match ctx.auth_user() {
        Some(_) => Ok(Flow::Continue),
        None => Ok(Flow::ShortCircuit(ErrorCapsule::unauthorized(
            "Authentication required",
        ))),
    })
}

/// Check the request body against a JSON Schema
///
/// The schema is compiled once, here; a schema that does not compile is a
/// bootstrap error.
pub fn validate_schema(name: &str, schema: &Value) -> Result<Command, ExecutionError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ExecutionError::custom(format!("Failed to compile schema '{}': {}", name, e)))?;
    let validator = Arc::new(validator);

    Ok(Command::new(format!("validate_schema({})", name), move |ctx| {
        let body = Value::Object(ctx.body.clone());
        if validator.is_valid(&body) {
            return Ok(Flow::Continue);
        }

        let errors: Vec<String> = validator.iter_errors(&body).map(|e| e.to_string()).collect();
        Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
            "Validation failed: {}",
            errors.join("; ")
        ))))
    }))
}

/// Deserialize the body into `T` and run its field validations
///
/// Empty strings count as absent, the way responses render unset fields.
pub fn validate_payload<T>() -> Command
where
    T: DeserializeOwned + Validate + 'static,
{
    Command::new(format!("validate_payload<{}>", short_type_name::<T>()), |ctx| {
        let present: Record = ctx
            .body
            .iter()
            .filter(|(_, value)| value.as_str() != Some(""))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let payload: T = match serde_json::from_value(Value::Object(present)) {
            Ok(payload) => payload,
            Err(e) => {
                return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                    "Invalid payload: {}",
                    e
                ))));
            }
        };

        match payload.validate() {
            Ok(()) => Ok(Flow::Continue),
            Err(errors) => Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                "Validation failed: {}",
                errors
            )))),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BrandPayload;
    use crate::pipeline::{CapsuleKind, Context, Record};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn capsule(flow: Flow) -> ErrorCapsule {
        match flow {
            Flow::ShortCircuit(capsule) => capsule,
            other => panic!("expected a capsule, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_uuid_accepts_uuid() {
        let mut ctx = Context::new("GET /brands/{id}")
            .with_path_param("id", "6f1c8a4e-5d0b-4c55-9a43-2a0c1f6f9b11");
        assert_eq!(validate_uuid("path.id").call(&mut ctx).unwrap(), Flow::Continue);
    }

    #[test]
    fn test_validate_uuid_rejects_malformed() {
        let mut ctx = Context::new("GET /brands/{id}").with_path_param("id", "not-a-uuid");

        assert_eq!(validate_uuid("path.id").call(&mut ctx).unwrap(), Flow::Halt);
        assert_eq!(ctx.response.status, 400);
        assert_eq!(ctx.response.body, json!({}));
    }

    #[test]
    fn test_validate_uuid_rejects_missing_and_non_string() {
        let mut ctx = Context::new("POST /x").with_body(record(json!({"listing_id": 12})));
        assert_eq!(validate_uuid("body.listing_id").call(&mut ctx).unwrap(), Flow::Halt);

        let mut ctx = Context::new("POST /x");
        assert_eq!(validate_uuid("body.listing_id").call(&mut ctx).unwrap(), Flow::Halt);
    }

    #[test]
    fn test_require_auth_user() {
        let mut anonymous = Context::new("GET /brands/me");
        let failure = capsule(require_auth_user().call(&mut anonymous).unwrap());
        assert_eq!(failure.kind, CapsuleKind::Unauthorized);
        assert_eq!(failure.status, 401);

        let mut known = Context::new("GET /brands/me").with_auth_user("user-1");
        assert_eq!(require_auth_user().call(&mut known).unwrap(), Flow::Continue);
    }

    #[test]
    fn test_validate_schema() {
        let command = validate_schema(
            "brand",
            &json!({
                "type": "object",
                "required": ["name"],
                "properties": {"name": {"type": "string", "minLength": 1}}
            }),
        )
        .unwrap();

        let mut ok = Context::new("POST /brands").with_body(record(json!({"name": "Acme"})));
        assert_eq!(command.call(&mut ok).unwrap(), Flow::Continue);

        let mut missing = Context::new("POST /brands").with_body(record(json!({"website": "x"})));
        let failure = capsule(command.call(&mut missing).unwrap());
        assert_eq!(failure.kind, CapsuleKind::ValidationFailed);
        assert!(failure.message.starts_with("Validation failed: "));
        assert!(failure.message.contains("name"));
    }

    #[test]
    fn test_validate_schema_rejects_bad_schema() {
        let err = validate_schema("broken", &json!({"type": 12})).unwrap_err();
        assert!(err.to_string().contains("Failed to compile schema 'broken'"));
    }

    #[test]
    fn test_validate_payload() {
        let command = validate_payload::<BrandPayload>();
        assert_eq!(command.name(), "validate_payload<BrandPayload>");

        let mut ok = Context::new("POST /brands").with_body(record(json!({"email": "a@b.example"})));
        assert_eq!(command.call(&mut ok).unwrap(), Flow::Continue);

        let mut bad_email = Context::new("POST /brands").with_body(record(json!({"email": "nope"})));
        let failure = capsule(command.call(&mut bad_email).unwrap());
        assert_eq!(failure.status, 400);
        assert!(failure.message.contains("email"));

        let mut wrong_type = Context::new("POST /brands").with_body(record(json!({"name": 5})));
        let failure = capsule(command.call(&mut wrong_type).unwrap());
        assert!(failure.message.starts_with("Invalid payload"));
    }

    #[test]
    fn test_validate_payload_treats_empty_strings_as_absent() {
        let command = validate_payload::<BrandPayload>();
        let mut ctx = Context::new("PUT /brands/me").with_body(record(json!({
            "name": "Acme",
            "website": "",
            "email": "",
            "description": "Anvils"
        })));

        assert_eq!(command.call(&mut ctx).unwrap(), Flow::Continue);
        assert_eq!(ctx.body["website"], json!(""));
    }
}
