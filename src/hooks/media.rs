use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::auth_user_or_short_circuit;
use crate::executor::traits::{ImageRepository, StorageError};
use crate::pipeline::{Command, ErrorCapsule, Flow};

/// Upload a base64 image from the body and replace it with its storage key
///
/// The image is stored under `{prefix}/{user}/{field}-{uuid}`. A value that
/// already is a storage key under `prefix`, bare or tagged with
/// `public_base_url` as responses carry it, is kept as the bare key, so
/// clients can send back what they read. Absent, null and empty fields are
/// skipped.
pub fn upload_image(
    images: Arc<dyn ImageRepository>,
    field: &str,
    prefix: &str,
    public_base_url: &str,
) -> Command {
    let field = field.to_string();
    let prefix = format!("{}/", prefix.trim_end_matches('/'));
    let public_prefix = format!("{}/", public_base_url.trim_end_matches('/'));
    Command::new(format!("upload_image({})", field), move |ctx| {
        let payload = match ctx.body.get(&field) {
            None | Some(Value::Null) => return Ok(Flow::Continue),
            Some(Value::String(payload)) if payload.is_empty() => return Ok(Flow::Continue),
            Some(Value::String(payload)) => payload.clone(),
            Some(_) => {
                return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                    "Invalid payload: '{}' must be a base64 string",
                    field
                ))));
            }
        };

        let stored_key = payload.strip_prefix(public_prefix.as_str()).unwrap_or(&payload);
        if stored_key.starts_with(prefix.as_str()) {
            let stored_key = stored_key.to_string();
            ctx.body.insert(field.clone(), Value::String(stored_key));
            return Ok(Flow::Continue);
        }

        let user = auth_user_or_short_circuit!(ctx);
        let path = format!("{}{}/{}-{}", prefix, user, field, Uuid::new_v4());

        let key = match images.upload(&path, &payload) {
            Ok(key) => key,
            Err(StorageError::InvalidPayload(reason)) => {
                return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                    "Invalid payload: '{}' is not a valid image ({})",
                    field, reason
                ))));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(field = %field, key = %key, "image uploaded");
        ctx.body.insert(field.clone(), Value::String(key));
        Ok(Flow::Continue)
    })
}
