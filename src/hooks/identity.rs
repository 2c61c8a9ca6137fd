use serde_json::Value;
use std::sync::Arc;

use super::auth_user_or_short_circuit;
use crate::executor::traits::{AuthUser, AuthUserRepository, IdentityError};
use crate::pipeline::{Command, Context, ErrorCapsule, ExecutionError, Flow};

fn load_user(identity: &dyn AuthUserRepository, user: &str) -> Result<Result<AuthUser, Flow>, ExecutionError> {
    match identity.get_by_id(user) {
        Ok(found) => Ok(Ok(found)),
        Err(IdentityError::UnknownUser(_)) => Ok(Err(Flow::ShortCircuit(ErrorCapsule::unauthorized(
            "Unknown user",
        )))),
        Err(err) => Err(err.into()),
    }
}

/// Fill name and email fields the body does not carry from the identity provider
pub fn enrich_from_identity(identity: Arc<dyn AuthUserRepository>) -> Command {
    Command::new("enrich_from_identity", move |ctx| {
        let user = auth_user_or_short_circuit!(ctx);
        let found = match load_user(identity.as_ref(), &user)? {
            Ok(found) => found,
            Err(flow) => return Ok(flow),
        };

        for (field, value) in [
            ("given_name", found.given_name),
            ("family_name", found.family_name),
            ("email", found.email),
        ] {
            let missing = match ctx.body.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(current)) => current.is_empty(),
                Some(_) => false,
            };
            if missing && !value.is_empty() {
                ctx.body.insert(field.to_string(), Value::String(value));
            }
        }
        Ok(Flow::Continue)
    })
}

fn created_id(ctx: &Context) -> Result<String, ExecutionError> {
    ctx.response
        .body
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExecutionError::type_error("response body carries no record id"))
}

/// Record the created brand's id in the caller's identity claims
pub fn update_brand_claims(identity: Arc<dyn AuthUserRepository>) -> Command {
    Command::new("update_brand_claims", move |ctx| {
        let user = auth_user_or_short_circuit!(ctx);
        let brand_id = created_id(ctx)?;
        let found = match load_user(identity.as_ref(), &user)? {
            Ok(found) => found,
            Err(flow) => return Ok(flow),
        };
        identity.update_brand_claims(&found, &brand_id)?;
        tracing::info!(user = %user, brand_id = %brand_id, "brand claims updated");
        Ok(Flow::Continue)
    })
}

/// Record the created influencer's id in the caller's identity claims
pub fn update_influencer_claims(identity: Arc<dyn AuthUserRepository>) -> Command {
    Command::new("update_influencer_claims", move |ctx| {
        let user = auth_user_or_short_circuit!(ctx);
        let influencer_id = created_id(ctx)?;
        let found = match load_user(identity.as_ref(), &user)? {
            Ok(found) => found,
            Err(flow) => return Ok(flow),
        };
        identity.update_influencer_claims(&found, &influencer_id)?;
        tracing::info!(user = %user, influencer_id = %influencer_id, "influencer claims updated");
        Ok(Flow::Continue)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::traits::InMemoryAuthUserRepository;
    use crate::pipeline::Record;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn identity() -> InMemoryAuthUserRepository {
        InMemoryAuthUserRepository::new().with_user(AuthUser {
            id: "u1".to_string(),
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..AuthUser::default()
        })
    }

    #[test]
    fn test_enrich_fills_missing_fields_only() {
        let mut ctx = Context::new("POST /influencers")
            .with_auth_user("u1")
            .with_body(record(json!({"given_name": "Augusta", "email": ""})));

        enrich_from_identity(Arc::new(identity())).call(&mut ctx).unwrap();

        assert_eq!(
            Value::Object(ctx.body),
            json!({"given_name": "Augusta", "family_name": "Lovelace", "email": "ada@example.com"})
        );
    }

    #[test]
    fn test_enrich_unknown_user_is_unauthorized() {
        let mut ctx = Context::new("POST /influencers").with_auth_user("ghost");

        match enrich_from_identity(Arc::new(identity())).call(&mut ctx).unwrap() {
            Flow::ShortCircuit(capsule) => {
                assert_eq!(capsule.status, 401);
                assert_eq!(capsule.message, "Unknown user");
            }
            other => panic!("unexpected flow {:?}", other),
        }
    }

    #[test]
    fn test_update_claims_after_create() {
        let store = identity();
        let mut ctx = Context::new("POST /brands").with_auth_user("u1");
        ctx.response.body = json!({"id": "brand-1"});

        update_brand_claims(Arc::new(store.clone())).call(&mut ctx).unwrap();
        ctx.response.body = json!({"id": "inf-1"});
        update_influencer_claims(Arc::new(store.clone())).call(&mut ctx).unwrap();

        let user = store.get_by_id("u1").unwrap();
        assert_eq!(user.brand_id.as_deref(), Some("brand-1"));
        assert_eq!(user.influencer_id.as_deref(), Some("inf-1"));
    }

    #[test]
    fn test_update_claims_without_id_is_fatal() {
        let mut ctx = Context::new("POST /brands").with_auth_user("u1");
        let err = update_brand_claims(Arc::new(identity())).call(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "Type error: response body carries no record id");
    }
}
