/// Before and After hooks
///
/// Every hook constructor returns a [`Command`](crate::pipeline::Command).
/// Before-hooks validate or enrich `Context::body` and report failures as
/// capsules; After-hooks reshape `Context::response`.
///
/// Hooks are grouped by concern:
/// - `validation` - identifier, identity, schema and payload checks
/// - `guard` - existence guards over a repository
/// - `response` - cache-merge and response shaping
/// - `controller` - repository reads and writes through the mapper
/// - `media`, `identity`, `audience`, `collaboration` - domain hooks

/// Caller identity or an Unauthorized short circuit
macro_rules! auth_user_or_short_circuit {
    ($ctx:expr) => {
        match $ctx.auth_user() {
            Some(user) => user.to_string(),
            None => {
                return Ok($crate::pipeline::Flow::ShortCircuit(
                    $crate::pipeline::ErrorCapsule::unauthorized("Authentication required"),
                ));
            }
        }
    };
}

pub(crate) use auth_user_or_short_circuit;

pub mod audience;
pub mod collaboration;
pub mod controller;
pub mod guard;
pub mod identity;
pub mod media;
pub mod response;
pub mod validation;

pub use controller::Controller;
pub use guard::{guard_exists_for_auth_user, guard_not_exists_for_auth_user};
pub use response::{
    copy_to_body, merge_cached_values, nest_response_body, save_response_body_to_cache, set_status,
    strip_response_fields, tag_image_url,
};
pub use validation::{require_auth_user, validate_payload, validate_schema, validate_uuid};

use crate::executor::traits::RepositoryError;
use crate::pipeline::{ErrorCapsule, ExecutionError, Flow};

/// Last path segment of a type name, used to label commands
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Turn a repository failure into a capsule where the caller can act on it
///
/// NotFound and AlreadyExists are domain outcomes; anything else is fatal.
pub(crate) fn capsule_from(err: RepositoryError) -> Result<Flow, ExecutionError> {
    match err {
        RepositoryError::NotFound { entity, .. } => Ok(Flow::ShortCircuit(ErrorCapsule::not_found(format!(
            "{} not found",
            entity
        )))),
        RepositoryError::AlreadyExists { entity, .. } => Ok(Flow::ShortCircuit(ErrorCapsule::already_exists(
            format!("{} already exists", entity),
        ))),
        other => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Brand;
    use crate::pipeline::CapsuleKind;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Brand>(), "Brand");
        assert_eq!(short_type_name::<Vec<Brand>>(), "Vec");
        assert_eq!(short_type_name::<u8>(), "u8");
    }

    #[test]
    fn test_capsule_from_repository_errors() {
        let flow = capsule_from(RepositoryError::not_found("Brand", "b1")).unwrap();
        assert_eq!(flow, Flow::ShortCircuit(ErrorCapsule::not_found("Brand not found")));

        match capsule_from(RepositoryError::already_exists("Brand", "u1")).unwrap() {
            Flow::ShortCircuit(capsule) => {
                assert_eq!(capsule.kind, CapsuleKind::AlreadyExists);
                assert_eq!(capsule.status, 400);
            }
            other => panic!("unexpected flow {:?}", other),
        }

        let err = capsule_from(RepositoryError::backend("offline")).unwrap_err();
        assert!(matches!(err, ExecutionError::Repository(_)));
    }
}
