use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::{auth_user_or_short_circuit, capsule_from};
use crate::executor::traits::{Entity, Repository};
use crate::models::{AgeBucket, Influencer};
use crate::pipeline::{Command, Context, ErrorCapsule, Flow, Record};

/// Percentages of a split must add up to this
pub const SPLIT_TOTAL: u32 = 100;

/// The record a split hook works on: the body itself or an object under `field`
///
/// `Ok(None)` means the field is absent and the hook has nothing to do.
fn split_record<'a>(ctx: &'a mut Context, field: Option<&str>) -> Result<Option<&'a mut Record>, ErrorCapsule> {
    let Some(field) = field else {
        return Ok(Some(&mut ctx.body));
    };
    match ctx.body.get_mut(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(record)) => Ok(Some(record)),
        Some(_) => Err(ErrorCapsule::validation_failed(format!(
            "Invalid payload: '{}' must be an object",
            field
        ))),
    }
}

#[derive(Deserialize)]
struct AgeSplitPayload {
    buckets: Vec<AgeBucket>,
}

#[derive(Deserialize)]
struct GenderSplitPayload {
    #[serde(default)]
    female: u8,
    #[serde(default)]
    male: u8,
    #[serde(default)]
    other: u8,
}

/// Check that age buckets are distinct and add up to 100 percent
pub fn validate_age_split(field: Option<&str>) -> Command {
    let field = field.map(str::to_string);
    Command::new("validate_age_split", move |ctx| {
        let record = match split_record(ctx, field.as_deref()) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(Flow::Continue),
            Err(capsule) => return Ok(Flow::ShortCircuit(capsule)),
        };

        let payload: AgeSplitPayload = match serde_json::from_value(Value::Object(record.clone())) {
            Ok(payload) => payload,
            Err(e) => {
                return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                    "Invalid age split: {}",
                    e
                ))));
            }
        };

        let mut seen = HashSet::new();
        if let Some(duplicate) = payload.buckets.iter().find(|b| !seen.insert(b.range)) {
            return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                "Invalid age split: range {:?} appears more than once",
                duplicate.range
            ))));
        }

        let total: u32 = payload.buckets.iter().map(|b| u32::from(b.percent)).sum();
        if total != SPLIT_TOTAL {
            return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                "Invalid age split: percentages add up to {}, expected {}",
                total, SPLIT_TOTAL
            ))));
        }
        Ok(Flow::Continue)
    })
}

/// Check that gender percentages add up to 100
pub fn validate_gender_split(field: Option<&str>) -> Command {
    let field = field.map(str::to_string);
    Command::new("validate_gender_split", move |ctx| {
        let record = match split_record(ctx, field.as_deref()) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(Flow::Continue),
            Err(capsule) => return Ok(Flow::ShortCircuit(capsule)),
        };

        let payload: GenderSplitPayload = match serde_json::from_value(Value::Object(record.clone())) {
            Ok(payload) => payload,
            Err(e) => {
                return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                    "Invalid gender split: {}",
                    e
                ))));
            }
        };

        let total = u32::from(payload.female) + u32::from(payload.male) + u32::from(payload.other);
        if total != SPLIT_TOTAL {
            return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                "Invalid gender split: percentages add up to {}, expected {}",
                total, SPLIT_TOTAL
            ))));
        }
        Ok(Flow::Continue)
    })
}

/// Set `influencer_id` on a split payload from the caller's influencer profile
pub fn link_influencer(influencers: Arc<dyn Repository<Influencer>>, field: Option<&str>) -> Command {
    let field = field.map(str::to_string);
    Command::new("link_influencer", move |ctx| {
        let user = auth_user_or_short_circuit!(ctx);
        if split_record(ctx, field.as_deref()).ok().flatten().is_none() {
            return Ok(Flow::Continue);
        }

        let influencer = match influencers.load_for_auth_user(&user) {
            Ok(influencer) => influencer,
            Err(err) => return capsule_from(err),
        };

        if let Ok(Some(record)) = split_record(ctx, field.as_deref()) {
            record.insert(
                "influencer_id".to_string(),
                Value::String(influencer.id().to_string()),
            );
        }
        Ok(Flow::Continue)
    })
}
