/// Marketplace route table
///
/// Every route is a sequence of hooks. Shared prefixes (authentication,
/// path id validation) are declared once as subsequences and inlined.
/// Composite resources are assembled with the cache-merge pattern: each
/// part stashes its response under a key and a final merge builds the body.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::executor::traits::{
    AuthUser, AuthUserRepository, ImageRepository, InMemoryAuthUserRepository, InMemoryImageRepository,
    InMemoryRepository, Repository,
};
use crate::handler::Handler;
use crate::hooks::audience::{link_influencer, validate_age_split, validate_gender_split};
use crate::hooks::collaboration::{guard_single_application, load_listing_into_cache, notify_listing_owner};
use crate::hooks::identity::{enrich_from_identity, update_brand_claims, update_influencer_claims};
use crate::hooks::media::upload_image;
use crate::hooks::{
    copy_to_body, guard_exists_for_auth_user, guard_not_exists_for_auth_user, merge_cached_values,
    nest_response_body, require_auth_user, save_response_body_to_cache, set_status, tag_image_url,
    validate_payload, validate_schema, validate_uuid, Controller,
};
use crate::models::{
    self, AudienceAgeSplit, AudienceAgeSplitDto, AudienceGenderSplit, AudienceGenderSplitDto, Brand, BrandDto,
    BrandPayload, Collaboration, CollaborationDto, CollaborationPayload, Influencer, InfluencerDto,
    InfluencerPayload, Listing, ListingDto, ListingPayload, Notification, NotificationDto,
};
use crate::pipeline::{CapsuleKind, SequenceBuilder};
use crate::registry::{Registry, RegistryBuilder, RegistryError};

const AGE_SPLIT_FIELD: &str = "audience_age_split";
const GENDER_SPLIT_FIELD: &str = "audience_gender_split";

/// Collaborators the routes are wired against
#[derive(Clone)]
pub struct Services {
    pub brands: Arc<dyn Repository<Brand>>,
    pub influencers: Arc<dyn Repository<Influencer>>,
    pub age_splits: Arc<dyn Repository<AudienceAgeSplit>>,
    pub gender_splits: Arc<dyn Repository<AudienceGenderSplit>>,
    pub listings: Arc<dyn Repository<Listing>>,
    pub collaborations: Arc<dyn Repository<Collaboration>>,
    pub notifications: Arc<dyn Repository<Notification>>,
    pub images: Arc<dyn ImageRepository>,
    pub identity: Arc<dyn AuthUserRepository>,
}

/// In-memory collaborators, kept concrete so callers can inspect them
#[derive(Debug, Clone, Default)]
pub struct InMemoryStores {
    pub brands: InMemoryRepository<Brand>,
    pub influencers: InMemoryRepository<Influencer>,
    pub age_splits: InMemoryRepository<AudienceAgeSplit>,
    pub gender_splits: InMemoryRepository<AudienceGenderSplit>,
    pub listings: InMemoryRepository<Listing>,
    pub collaborations: InMemoryRepository<Collaboration>,
    pub notifications: InMemoryRepository<Notification>,
    pub images: InMemoryImageRepository,
    pub identity: InMemoryAuthUserRepository,
}

impl InMemoryStores {
    /// Empty stores with the given identities registered
    pub fn new(users: impl IntoIterator<Item = AuthUser>) -> Self {
        let identity = users
            .into_iter()
            .fold(InMemoryAuthUserRepository::new(), |identity, user| identity.with_user(user));
        Self {
            identity,
            ..Self::default()
        }
    }

    pub fn services(&self) -> Services {
        Services {
            brands: Arc::new(self.brands.clone()),
            influencers: Arc::new(self.influencers.clone()),
            age_splits: Arc::new(self.age_splits.clone()),
            gender_splits: Arc::new(self.gender_splits.clone()),
            listings: Arc::new(self.listings.clone()),
            collaborations: Arc::new(self.collaborations.clone()),
            notifications: Arc::new(self.notifications.clone()),
            images: Arc::new(self.images.clone()),
            identity: Arc::new(self.identity.clone()),
        }
    }
}

fn brand_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "values": {
                "anyOf": [
                    {"type": "string"},
                    {"type": "array", "items": {"type": "string"}}
                ]
            }
        }
    })
}

fn listing_schema() -> Value {
    json!({
        "type": "object",
        "required": ["title", "kind", "compensation"],
        "properties": {
            "title": {"type": "string", "minLength": 1},
            "kind": {"enum": ["Product", "Experience", "Event"]},
            "deliverables": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["platform", "quantity"],
                    "properties": {
                        "platform": {"enum": ["Instagram", "TikTok", "YouTube"]},
                        "quantity": {"type": "integer", "minimum": 1}
                    }
                }
            },
            "compensation": {
                "type": "object",
                "required": ["amount_cents", "currency"],
                "properties": {
                    "amount_cents": {"type": "integer", "minimum": 0},
                    "currency": {"type": "string", "pattern": "^[A-Z]{3}$"}
                }
            }
        }
    })
}

/// Wire a handler against fresh in-memory stores seeded from the config
pub fn in_memory_handler(config: &AppConfig) -> Result<(Handler, InMemoryStores), RegistryError> {
    let stores = InMemoryStores::new(config.users.iter().cloned());
    let registry = marketplace_registry(&stores.services(), config)?;
    Ok((Handler::new(Arc::new(registry), config), stores))
}

/// Build the registry with every marketplace route
pub fn marketplace_registry(services: &Services, config: &AppConfig) -> Result<Registry, RegistryError> {
    let mapper = Arc::new(models::object_mapper()?);
    let images = &config.images;
    let base_url = images.public_base_url.as_str();

    let brands: Controller<Brand, BrandDto> = Controller::new(services.brands.clone(), mapper.clone());
    let influencers: Controller<Influencer, InfluencerDto> =
        Controller::new(services.influencers.clone(), mapper.clone());
    let age_splits: Controller<AudienceAgeSplit, AudienceAgeSplitDto> =
        Controller::new(services.age_splits.clone(), mapper.clone());
    let gender_splits: Controller<AudienceGenderSplit, AudienceGenderSplitDto> =
        Controller::new(services.gender_splits.clone(), mapper.clone());
    let listings: Controller<Listing, ListingDto> = Controller::new(services.listings.clone(), mapper.clone());
    let collaborations: Controller<Collaboration, CollaborationDto> =
        Controller::new(services.collaborations.clone(), mapper.clone());
    let notifications: Controller<Notification, NotificationDto> =
        Controller::new(services.notifications.clone(), mapper.clone());

    let authenticated = SequenceBuilder::new("authenticated").add_command(require_auth_user());
    let by_id = SequenceBuilder::new("by_id").add_command(validate_uuid("path.id"));

    let tag_logo = tag_image_url("logo", base_url);
    let tag_image = tag_image_url("image", base_url);

    // Influencer profile followed by both audience splits, merged into one body
    let influencer_composite = SequenceBuilder::new("influencer_composite")
        .add_command(save_response_body_to_cache("influencer"))
        .add_command(age_splits.find_for_auth_user())
        .add_command(nest_response_body(AGE_SPLIT_FIELD))
        .add_command(save_response_body_to_cache("age_split"))
        .add_command(gender_splits.find_for_auth_user())
        .add_command(nest_response_body(GENDER_SPLIT_FIELD))
        .add_command(save_response_body_to_cache("gender_split"))
        .add_command(merge_cached_values(&["influencer", "age_split", "gender_split"]));

    let registry = RegistryBuilder::new()
        .with_mapper(mapper.clone())
        // Brands
        .route(
            "GET /brands",
            SequenceBuilder::new("list_brands")
                .add_command(brands.get_collection())
                .add_command(tag_logo.clone()),
        )?
        .route(
            "GET /brands/{id}",
            SequenceBuilder::new("get_brand")
                .add_sequence(&by_id)
                .add_command(brands.get_by_id())
                .add_command(tag_logo.clone()),
        )?
        .route(
            "GET /brands/me",
            SequenceBuilder::new("get_own_brand")
                .add_sequence(&authenticated)
                .add_command(brands.get_for_auth_user())
                .add_command(tag_logo.clone()),
        )?
        .route(
            "POST /brands",
            SequenceBuilder::new("create_brand")
                .add_sequence(&authenticated)
                .add_command(validate_schema("brand", &brand_schema())?)
                .add_command(validate_payload::<BrandPayload>())
                .add_command(guard_not_exists_for_auth_user(services.brands.clone()))
                .add_command(enrich_from_identity(services.identity.clone()))
                .add_command(upload_image(services.images.clone(), "logo", &images.brand_prefix, base_url))
                .add_command(brands.create_for_auth_user())
                .add_command(update_brand_claims(services.identity.clone()))
                .add_command(tag_logo.clone()),
        )?
        .route(
            "PUT /brands/me",
            SequenceBuilder::new("update_own_brand")
                .add_sequence(&authenticated)
                .add_command(validate_payload::<BrandPayload>())
                .add_command(upload_image(services.images.clone(), "logo", &images.brand_prefix, base_url))
                .add_command(brands.update_for_auth_user())
                .add_command(tag_logo.clone()),
        )?
        // Influencers
        .route(
            "GET /influencers",
            SequenceBuilder::new("list_influencers")
                .add_command(influencers.get_collection())
                .add_command(tag_image.clone()),
        )?
        .route(
            "GET /influencers/{id}",
            SequenceBuilder::new("get_influencer")
                .add_sequence(&by_id)
                .add_command(influencers.get_by_id())
                .add_command(tag_image.clone()),
        )?
        .route(
            "GET /influencers/me",
            SequenceBuilder::new("get_own_influencer")
                .add_sequence(&authenticated)
                .add_command(influencers.get_for_auth_user())
                .add_command(tag_image.clone())
                .add_sequence(&influencer_composite),
        )?
        .route(
            "POST /influencers",
            SequenceBuilder::new("create_influencer")
                .add_sequence(&authenticated)
                .add_command(validate_payload::<InfluencerPayload>())
                .add_command(validate_age_split(Some(AGE_SPLIT_FIELD)))
                .add_command(validate_gender_split(Some(GENDER_SPLIT_FIELD)))
                .add_command(guard_not_exists_for_auth_user(services.influencers.clone()))
                .add_command(enrich_from_identity(services.identity.clone()))
                .add_command(upload_image(
                    services.images.clone(),
                    "image",
                    &images.influencer_prefix,
                    base_url,
                ))
                .add_command(influencers.create_for_auth_user())
                .add_command(update_influencer_claims(services.identity.clone()))
                .add_command(tag_image.clone())
                .add_command(save_response_body_to_cache("influencer"))
                .add_command(link_influencer(services.influencers.clone(), Some(AGE_SPLIT_FIELD)))
                .add_command(age_splits.create_nested_for_auth_user(AGE_SPLIT_FIELD))
                .add_command(nest_response_body(AGE_SPLIT_FIELD))
                .add_command(save_response_body_to_cache("age_split"))
                .add_command(link_influencer(services.influencers.clone(), Some(GENDER_SPLIT_FIELD)))
                .add_command(gender_splits.create_nested_for_auth_user(GENDER_SPLIT_FIELD))
                .add_command(nest_response_body(GENDER_SPLIT_FIELD))
                .add_command(save_response_body_to_cache("gender_split"))
                .add_command(merge_cached_values(&["influencer", "age_split", "gender_split"]))
                .add_command(set_status(201)),
        )?
        .route(
            "PUT /influencers/me",
            SequenceBuilder::new("update_own_influencer")
                .add_sequence(&authenticated)
                .add_command(validate_payload::<InfluencerPayload>())
                .add_command(upload_image(
                    services.images.clone(),
                    "image",
                    &images.influencer_prefix,
                    base_url,
                ))
                .add_command(influencers.update_for_auth_user())
                .add_command(tag_image.clone()),
        )?
        .route(
            "PUT /influencers/me/audience/age",
            SequenceBuilder::new("put_age_split")
                .add_sequence(&authenticated)
                .add_command(validate_age_split(None))
                .add_command(link_influencer(services.influencers.clone(), None))
                .add_command(age_splits.upsert_for_auth_user()),
        )?
        .route(
            "PUT /influencers/me/audience/gender",
            SequenceBuilder::new("put_gender_split")
                .add_sequence(&authenticated)
                .add_command(validate_gender_split(None))
                .add_command(link_influencer(services.influencers.clone(), None))
                .add_command(gender_splits.upsert_for_auth_user()),
        )?
        // Listings
        .route(
            "GET /listings",
            SequenceBuilder::new("list_listings")
                .add_command(listings.get_collection())
                .add_command(tag_image.clone()),
        )?
        .route(
            "GET /listings/{id}",
            SequenceBuilder::new("get_listing")
                .add_sequence(&by_id)
                .add_command(listings.get_by_id())
                .add_command(tag_image.clone()),
        )?
        .route(
            "POST /listings",
            SequenceBuilder::new("create_listing")
                .add_sequence(&authenticated)
                .add_command(validate_schema("listing", &listing_schema())?)
                .add_command(validate_payload::<ListingPayload>())
                .add_command(guard_exists_for_auth_user(
                    services.brands.clone(),
                    CapsuleKind::Forbidden,
                ))
                .add_command(brands.get_for_auth_user())
                .add_command(save_response_body_to_cache("brand"))
                .add_command(copy_to_body("cache.brand.id", "brand_id"))
                .add_command(upload_image(services.images.clone(), "image", &images.listing_prefix, base_url))
                .add_command(listings.create_for_auth_user())
                .add_command(tag_image.clone()),
        )?
        // Collaborations
        .route(
            "POST /collaborations",
            SequenceBuilder::new("apply_to_listing")
                .add_sequence(&authenticated)
                .add_command(validate_payload::<CollaborationPayload>())
                .add_command(validate_uuid("body.listing_id"))
                .add_command(guard_exists_for_auth_user(
                    services.influencers.clone(),
                    CapsuleKind::Forbidden,
                ))
                .add_command(influencers.get_for_auth_user())
                .add_command(save_response_body_to_cache("influencer"))
                .add_command(copy_to_body("cache.influencer.id", "influencer_id"))
                .add_command(load_listing_into_cache(services.listings.clone()))
                .add_command(copy_to_body("cache.listing.brand_id", "brand_id"))
                .add_command(guard_single_application(services.collaborations.clone()))
                .add_command(collaborations.create_for_auth_user())
                .add_command(notify_listing_owner(services.notifications.clone())),
        )?
        .route(
            "GET /collaborations/me",
            SequenceBuilder::new("list_own_collaborations")
                .add_sequence(&authenticated)
                .add_command(collaborations.get_collection_for_auth_user()),
        )?
        // Notifications
        .route(
            "GET /notifications/me",
            SequenceBuilder::new("list_own_notifications")
                .add_sequence(&authenticated)
                .add_command(notifications.get_collection_for_auth_user()),
        )?
        .build();

    Ok(registry)
}
