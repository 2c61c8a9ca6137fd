use serde_json::Value;
use std::sync::Arc;

use super::{auth_user_or_short_circuit, capsule_from};
use crate::executor::traits::Repository;
use crate::models::{Collaboration, Listing, ListingStatus, Notification};
use crate::pipeline::{Command, Context, ErrorCapsule, ExecutionError, Flow};

/// Cache key the listing being applied to is stored under
pub const LISTING_CACHE_KEY: &str = "listing";

fn body_listing_id(ctx: &Context) -> Option<String> {
    ctx.body
        .get("listing_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Load the listing named by `body.listing_id` and cache it
///
/// A missing listing is NotFound; a closed one does not accept applications.
pub fn load_listing_into_cache(listings: Arc<dyn Repository<Listing>>) -> Command {
    Command::new("load_listing_into_cache", move |ctx| {
        let Some(listing_id) = body_listing_id(ctx) else {
            return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(
                "Invalid payload: 'listing_id' is required",
            )));
        };

        let listing = match listings.load_by_id(&listing_id) {
            Ok(listing) => listing,
            Err(err) => return capsule_from(err),
        };
        if listing.status == ListingStatus::Closed {
            return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(
                "Listing is closed for applications",
            )));
        }

        ctx.cache(LISTING_CACHE_KEY, serde_json::to_value(&listing)?);
        Ok(Flow::Continue)
    })
}

/// Stop with AlreadyExists when the caller has applied to the listing before
pub fn guard_single_application(collaborations: Arc<dyn Repository<Collaboration>>) -> Command {
    Command::new("guard_single_application", move |ctx| {
        let user = auth_user_or_short_circuit!(ctx);
        let Some(listing_id) = body_listing_id(ctx) else {
            return Ok(Flow::Continue);
        };

        let applied = collaborations
            .load_collection_for_auth_user(&user)?
            .iter()
            .any(|c| c.listing_id == listing_id);
        if applied {
            return Ok(Flow::ShortCircuit(ErrorCapsule::already_exists(
                "You have already applied to this listing",
            )));
        }
        Ok(Flow::Continue)
    })
}

/// Tell the listing owner about a new application
///
/// Runs after the collaboration is written: reads the created record from
/// the response body and the listing from the cache.
pub fn notify_listing_owner(notifications: Arc<dyn Repository<Notification>>) -> Command {
    Command::new("notify_listing_owner", move |ctx| {
        let listing = ctx
            .cached(LISTING_CACHE_KEY)
            .cloned()
            .ok_or_else(|| ExecutionError::custom("listing missing from cache"))?;
        let listing: Listing = serde_json::from_value(listing)?;

        let collaboration_id = ctx
            .response
            .body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let applicant = ctx
            .get_path("cache.influencer.full_name")
            .and_then(|name| name.as_str().map(str::to_string))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "An influencer".to_string());

        let notification = Notification {
            owner_id: listing.owner_id.clone(),
            title: "New application".to_string(),
            message: format!("{} applied to \"{}\"", applicant, listing.title),
            collaboration_id,
            ..Notification::default()
        };

        let written = notifications.write_new(notification)?;
        notifications.save()?;
        tracing::info!(recipient = %written.owner_id, listing = %listing.id, "listing owner notified");
        Ok(Flow::Continue)
    })
}
