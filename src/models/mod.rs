/// Marketplace domain models and their wire types
///
/// Each entity has a domain struct (persisted through a repository), a
/// DTO returned to callers and, where callers can write it, a payload type
/// carrying field-level validation rules.

macro_rules! entity {
    ($ty:ident, $name:literal, unique = $unique:literal) => {
        impl $crate::executor::traits::Entity for $ty {
            const ENTITY: &'static str = $name;
            const UNIQUE_PER_OWNER: bool = $unique;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn owner_id(&self) -> Option<&str> {
                Some(self.owner_id.as_str()).filter(|owner| !owner.is_empty())
            }

            fn set_owner_id(&mut self, owner_id: String) {
                self.owner_id = owner_id;
            }
        }
    };
}

mod audience;
mod brand;
mod collaboration;
mod influencer;
mod listing;
mod notification;

pub use audience::{
    AgeBucket, AgeBucketDto, AgeRange, AudienceAgeSplit, AudienceAgeSplitDto, AudienceGenderSplit,
    AudienceGenderSplitDto,
};
pub use brand::{Brand, BrandDto, BrandPayload};
pub use collaboration::{Collaboration, CollaborationDto, CollaborationPayload, CollaborationStatus};
pub use influencer::{Influencer, InfluencerDto, InfluencerPayload};
pub use listing::{
    Compensation, CompensationDto, Deliverable, DeliverableDto, Listing, ListingDto, ListingKind,
    ListingPayload, ListingStatus, Platform,
};
pub use notification::{Notification, NotificationDto};

use serde_json::Value;

use crate::mapper::{MappingError, ObjectMapper};
use crate::pipeline::Record;

/// Build the object mapper with every marketplace override rule
pub fn object_mapper() -> Result<ObjectMapper, MappingError> {
    let mapper = ObjectMapper::builder()
        .add_rule::<Influencer, InfluencerDto, _>("full_name", false, |dto, influencer| {
            dto.full_name = influencer.full_name();
        })?
        .add_rule::<Record, Influencer, _>("categories", true, |influencer, source| {
            if let Some(categories) = source.get("categories").and_then(parse_tags) {
                influencer.categories = categories;
            }
        })?
        .add_rule::<Record, Brand, _>("values", true, |brand, source| {
            if let Some(values) = source.get("values").and_then(parse_tags) {
                brand.values = values;
            }
        })?
        .add_rule::<Record, Listing, _>("status", false, |listing, _| {
            listing.status = ListingStatus::Open;
        })?
        .add_rule::<Record, Collaboration, _>("status", false, |collaboration, _| {
            collaboration.status = CollaborationStatus::Applied;
        })?
        .build();
    Ok(mapper)
}

/// Accept either a list of strings or one comma separated string
fn parse_tags(value: &Value) -> Option<Vec<String>> {
    let tags: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(joined) => joined.split(',').map(str::to_string).collect(),
        _ => return None,
    };

    Some(
        tags.into_iter()
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect(),
    )
}
