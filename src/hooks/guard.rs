use std::sync::Arc;

use super::{auth_user_or_short_circuit, short_type_name};
use crate::executor::traits::{Entity, Repository};
use crate::pipeline::{CapsuleKind, Command, ErrorCapsule, Flow};

/// Stop with AlreadyExists when the caller already owns a `T`
///
/// Only an existence query runs; the record is never loaded.
pub fn guard_not_exists_for_auth_user<T: Entity>(repo: Arc<dyn Repository<T>>) -> Command {
    Command::new(
        format!("guard_not_exists_for_auth_user<{}>", short_type_name::<T>()),
        move |ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            if repo.exists_for_auth_user(&user)? {
                tracing::debug!(entity = T::ENTITY, user = %user, "record already exists for caller");
                return Ok(Flow::ShortCircuit(ErrorCapsule::already_exists(format!(
                    "{} already exists for this user",
                    T::ENTITY
                ))));
            }
            Ok(Flow::Continue)
        },
    )
}

/// Stop with a capsule of `kind` unless the caller owns a `T`
pub fn guard_exists_for_auth_user<T: Entity>(repo: Arc<dyn Repository<T>>, kind: CapsuleKind) -> Command {
    Command::new(
        format!("guard_exists_for_auth_user<{}>", short_type_name::<T>()),
        move |ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            if repo.exists_for_auth_user(&user)? {
                return Ok(Flow::Continue);
            }
            let message = match kind {
                CapsuleKind::NotFound => format!("{} not found", T::ENTITY),
                _ => format!("A {} is required for this operation", T::ENTITY.to_lowercase()),
            };
            Ok(Flow::ShortCircuit(ErrorCapsule::new(kind, message)))
        },
    )
}
