use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{auth_user_or_short_circuit, capsule_from, short_type_name};
use crate::executor::traits::{Entity, Repository};
use crate::mapper::{Mappable, MappingError, ObjectMapper};
use crate::pipeline::{Command, Context, ErrorCapsule, ExecutionError, Flow, Record};

/// Repository-backed commands for one entity and its wire type
///
/// `T` is the persisted entity and `D` the DTO written to the response.
/// Inbound payloads are mapped from `Context::body` into `T`; outbound
/// records are mapped from `T` into `D`.
pub struct Controller<T, D> {
    repo: Arc<dyn Repository<T>>,
    mapper: Arc<ObjectMapper>,
    _dto: PhantomData<fn() -> D>,
}

impl<T, D> Clone for Controller<T, D> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            mapper: self.mapper.clone(),
            _dto: PhantomData,
        }
    }
}

impl<T, D> Controller<T, D>
where
    T: Entity + Mappable,
    D: Mappable,
{
    pub fn new(repo: Arc<dyn Repository<T>>, mapper: Arc<ObjectMapper>) -> Self {
        Self {
            repo,
            mapper,
            _dto: PhantomData,
        }
    }

    fn command<F>(&self, action: &str, f: F) -> Command
    where
        F: Fn(&Self, &mut Context) -> Result<Flow, ExecutionError> + Send + Sync + 'static,
    {
        let this = self.clone();
        Command::new(format!("{}<{}>", action, short_type_name::<T>()), move |ctx| f(&this, ctx))
    }

    /// Load the record named by the path id
    pub fn get_by_id(&self) -> Command {
        self.command("get_by_id", |this, ctx| {
            let Some(id) = ctx.id.clone() else {
                return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed("Missing id")));
            };
            match this.repo.load_by_id(&id) {
                Ok(record) => this.respond(ctx, 200, &record),
                Err(err) => capsule_from(err),
            }
        })
    }

    pub fn get_collection(&self) -> Command {
        self.command("get_collection", |this, ctx| {
            let records = this.repo.load_collection()?;
            this.respond_collection(ctx, &records)
        })
    }

    /// Load the record owned by the caller
    pub fn get_for_auth_user(&self) -> Command {
        self.command("get_for_auth_user", |this, ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            match this.repo.load_for_auth_user(&user) {
                Ok(record) => this.respond(ctx, 200, &record),
                Err(err) => capsule_from(err),
            }
        })
    }

    /// Load the record owned by the caller, or respond with `null`
    ///
    /// Used when assembling composite resources where a part may not exist.
    pub fn find_for_auth_user(&self) -> Command {
        self.command("find_for_auth_user", |this, ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            if !this.repo.exists_for_auth_user(&user)? {
                ctx.response.body = Value::Null;
                return Ok(Flow::Continue);
            }
            let record = this.repo.load_for_auth_user(&user)?;
            this.respond(ctx, 200, &record)
        })
    }

    pub fn get_collection_for_auth_user(&self) -> Command {
        self.command("get_collection_for_auth_user", |this, ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            let records = this.repo.load_collection_for_auth_user(&user)?;
            this.respond_collection(ctx, &records)
        })
    }

    /// Create a record owned by the caller from the request body
    pub fn create_for_auth_user(&self) -> Command {
        self.command("create_for_auth_user", |this, ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            let record = match this.from_payload(&ctx.body) {
                Ok(record) => record,
                Err(capsule) => return Ok(Flow::ShortCircuit(capsule)),
            };
            this.write_new_for(ctx, &user, record)
        })
    }

    /// Create a record from the request body without an owner
    pub fn create(&self) -> Command {
        self.command("create", |this, ctx| {
            let record = match this.from_payload(&ctx.body) {
                Ok(record) => record,
                Err(capsule) => return Ok(Flow::ShortCircuit(capsule)),
            };
            let written = this.repo.write_new(record)?;
            this.repo.save()?;
            this.respond(ctx, 201, &written)
        })
    }

    /// Create a caller-owned record from the object under `field` in the body
    ///
    /// When the body has no such field nothing is written and the response
    /// body becomes `null`.
    pub fn create_nested_for_auth_user(&self, field: &str) -> Command {
        let field = field.to_string();
        self.command("create_nested_for_auth_user", move |this, ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            let payload = match ctx.body.get(&field) {
                None | Some(Value::Null) => {
                    ctx.response.body = Value::Null;
                    return Ok(Flow::Continue);
                }
                Some(Value::Object(payload)) => payload.clone(),
                Some(_) => {
                    return Ok(Flow::ShortCircuit(ErrorCapsule::validation_failed(format!(
                        "Invalid payload: '{}' must be an object",
                        field
                    ))));
                }
            };
            let record = match this.from_payload(&payload) {
                Ok(record) => record,
                Err(capsule) => return Ok(Flow::ShortCircuit(capsule)),
            };
            this.write_new_for(ctx, &user, record)
        })
    }

    /// Apply the request body to the caller's record as a partial update
    ///
    /// Identifier and owner are never changed by the payload.
    pub fn update_for_auth_user(&self) -> Command {
        self.command("update_for_auth_user", |this, ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            let existing = match this.repo.load_for_auth_user(&user) {
                Ok(existing) => existing,
                Err(err) => return capsule_from(err),
            };
            this.apply_update(ctx, existing)
        })
    }

    /// Replace the caller's record with the body, creating it when there is none
    ///
    /// Unlike [`update_for_auth_user`](Self::update_for_auth_user) nothing of
    /// the stored record survives except its id and owner, so the written
    /// record is exactly what a before-hook validated.
    pub fn upsert_for_auth_user(&self) -> Command {
        self.command("upsert_for_auth_user", |this, ctx| {
            let user = auth_user_or_short_circuit!(ctx);
            let mut record = match this.from_payload(&ctx.body) {
                Ok(record) => record,
                Err(capsule) => return Ok(Flow::ShortCircuit(capsule)),
            };
            if !this.repo.exists_for_auth_user(&user)? {
                return this.write_new_for(ctx, &user, record);
            }

            let existing = this.repo.load_for_auth_user(&user)?;
            record.set_id(existing.id().to_string());
            record.set_owner_id(user.clone());
            let written = match this.repo.write(record) {
                Ok(written) => written,
                Err(err) => return capsule_from(err),
            };
            this.repo.save()?;
            this.respond(ctx, 200, &written)
        })
    }

    fn from_payload(&self, payload: &Record) -> Result<T, ErrorCapsule> {
        let mut record: T = self.mapper.map_from_dict(payload).map_err(invalid_payload)?;
        record.set_id(String::new());
        Ok(record)
    }

    fn write_new_for(&self, ctx: &mut Context, user: &str, record: T) -> Result<Flow, ExecutionError> {
        let written = match self.repo.write_new_for_auth_user(user, record) {
            Ok(written) => written,
            Err(err) => return capsule_from(err),
        };
        self.repo.save()?;
        tracing::info!(entity = T::ENTITY, id = written.id(), user = %user, "record created");
        self.respond(ctx, 201, &written)
    }

    fn apply_update(&self, ctx: &mut Context, mut existing: T) -> Result<Flow, ExecutionError> {
        let id = existing.id().to_string();
        let owner = existing.owner_id().map(str::to_string);

        if let Err(err) = self.mapper.update_from_dict(&ctx.body, &mut existing) {
            return Ok(Flow::ShortCircuit(invalid_payload(err)));
        }
        existing.set_id(id);
        if let Some(owner) = owner {
            existing.set_owner_id(owner);
        }

        let written = match self.repo.write(existing) {
            Ok(written) => written,
            Err(err) => return capsule_from(err),
        };
        self.repo.save()?;
        self.respond(ctx, 200, &written)
    }

    fn respond(&self, ctx: &mut Context, status: u16, record: &T) -> Result<Flow, ExecutionError> {
        let dto: D = self.mapper.map(record)?;
        ctx.response.status = status;
        ctx.response.body = serde_json::to_value(&dto)?;
        Ok(Flow::Continue)
    }

    fn respond_collection(&self, ctx: &mut Context, records: &[T]) -> Result<Flow, ExecutionError> {
        let dtos: Vec<D> = self.mapper.map_collection(records)?;
        ctx.response.status = 200;
        ctx.response.body = serde_json::to_value(&dtos)?;
        Ok(Flow::Continue)
    }
}

fn invalid_payload(err: MappingError) -> ErrorCapsule {
    ErrorCapsule::validation_failed(format!("Invalid payload: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::traits::InMemoryRepository;
    use crate::models::{self, Brand, BrandDto, Influencer, InfluencerDto};
    use crate::pipeline::CapsuleKind;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn mapper() -> Arc<ObjectMapper> {
        Arc::new(models::object_mapper().unwrap())
    }

    fn brand(id: &str, owner: &str, name: &str) -> Brand {
        Brand {
            id: id.to_string(),
            owner_id: owner.to_string(),
            name: name.to_string(),
            logo: format!("brands/{}/logo", owner),
            ..Brand::default()
        }
    }

    fn brands(records: Vec<Brand>) -> (InMemoryRepository<Brand>, Controller<Brand, BrandDto>) {
        let repo = InMemoryRepository::new()
            .with_records(records)
            .with_id_generator(|| "new-id".to_string());
        let controller = Controller::new(Arc::new(repo.clone()), mapper());
        (repo, controller)
    }

    fn capsule(flow: Flow) -> ErrorCapsule {
        match flow {
            Flow::ShortCircuit(capsule) => capsule,
            other => panic!("expected a capsule, got {:?}", other),
        }
    }

    #[test]
    fn test_get_by_id() {
        let (_, controller) = brands(vec![brand("b1", "u1", "Acme")]);
        let mut ctx = Context::new("GET /brands/{id}").with_path_param("id", "b1");

        assert_eq!(controller.get_by_id().call(&mut ctx).unwrap(), Flow::Continue);
        assert_eq!(ctx.response.status, 200);
        assert_eq!(ctx.response.body["name"], json!("Acme"));
        assert!(ctx.response.body.get("owner_id").is_none());
    }

    #[test]
    fn test_get_by_id_not_found_is_capsule() {
        let (_, controller) = brands(vec![]);
        let mut ctx = Context::new("GET /brands/{id}").with_path_param("id", "nope");

        let failure = capsule(controller.get_by_id().call(&mut ctx).unwrap());
        assert_eq!(failure.kind, CapsuleKind::NotFound);
        assert_eq!(failure.message, "Brand not found");
    }

    #[test]
    fn test_get_collection_preserves_order() {
        let (_, controller) = brands(vec![brand("b1", "u1", "Acme"), brand("b2", "u2", "Globex")]);
        let mut ctx = Context::new("GET /brands");

        controller.get_collection().call(&mut ctx).unwrap();
        let names: Vec<&str> = ctx
            .response
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Acme", "Globex"]);
    }

    #[test]
    fn test_get_for_auth_user() {
        let (_, controller) = brands(vec![brand("b1", "u1", "Acme"), brand("b2", "u2", "Globex")]);
        let mut ctx = Context::new("GET /brands/me").with_auth_user("u2");

        controller.get_for_auth_user().call(&mut ctx).unwrap();
        assert_eq!(ctx.response.body["id"], json!("b2"));

        let mut nobody = Context::new("GET /brands/me").with_auth_user("u3");
        let failure = capsule(controller.get_for_auth_user().call(&mut nobody).unwrap());
        assert_eq!(failure.status, 404);
    }

    #[test]
    fn test_find_for_auth_user_responds_null_when_missing() {
        let (repo, controller) = brands(vec![]);
        let mut ctx = Context::new("GET /x").with_auth_user("u1");

        assert_eq!(controller.find_for_auth_user().call(&mut ctx).unwrap(), Flow::Continue);
        assert_eq!(ctx.response.body, Value::Null);
        assert_eq!(repo.calls(), vec!["exists_for_auth_user"]);
    }

    #[test]
    fn test_create_for_auth_user() {
        let (repo, controller) = brands(vec![]);
        let mut ctx = Context::new("POST /brands")
            .with_auth_user("u1")
            .with_body(record(json!({
                "id": "client-chosen",
                "name": "Acme",
                "values": "Eco, Local ,"
            })));

        controller.create_for_auth_user().call(&mut ctx).unwrap();

        assert_eq!(ctx.response.status, 201);
        assert_eq!(ctx.response.body["id"], json!("new-id"));
        assert_eq!(ctx.response.body["values"], json!(["eco", "local"]));
        let stored = repo.records();
        assert_eq!(stored[0].owner_id, "u1");
        assert_eq!(repo.save_count(), 1);
    }

    #[test]
    fn test_create_for_auth_user_already_exists_is_capsule() {
        let (repo, controller) = brands(vec![brand("b1", "u1", "Acme")]);
        let mut ctx = Context::new("POST /brands")
            .with_auth_user("u1")
            .with_body(record(json!({"name": "Second"})));

        let failure = capsule(controller.create_for_auth_user().call(&mut ctx).unwrap());
        assert_eq!(failure.kind, CapsuleKind::AlreadyExists);
        assert_eq!(repo.save_count(), 0);
    }

    #[test]
    fn test_create_rejects_wrong_shape() {
        let (repo, controller) = brands(vec![]);
        let mut ctx = Context::new("POST /brands")
            .with_auth_user("u1")
            .with_body(record(json!({"name": ["not", "a", "string"]})));

        let failure = capsule(controller.create_for_auth_user().call(&mut ctx).unwrap());
        assert_eq!(failure.kind, CapsuleKind::ValidationFailed);
        assert!(failure.message.starts_with("Invalid payload"));
        assert!(repo.records().is_empty());
    }

    #[test]
    fn test_create_without_owner() {
        let (repo, controller) = brands(vec![]);
        let mut ctx = Context::new("POST /x").with_body(record(json!({"name": "Acme"})));

        controller.create().call(&mut ctx).unwrap();
        assert_eq!(ctx.response.status, 201);
        assert_eq!(repo.records()[0].owner_id, "");
        assert_eq!(repo.calls(), vec!["write_new", "save"]);
    }

    #[test]
    fn test_create_nested_for_auth_user() {
        let (_, controller) = brands(vec![]);
        let mut ctx = Context::new("POST /x")
            .with_auth_user("u1")
            .with_body(record(json!({"brand": {"name": "Acme"}})));

        controller.create_nested_for_auth_user("brand").call(&mut ctx).unwrap();
        assert_eq!(ctx.response.body["name"], json!("Acme"));

        let mut absent = Context::new("POST /x").with_auth_user("u2");
        controller.create_nested_for_auth_user("brand").call(&mut absent).unwrap();
        assert_eq!(absent.response.body, Value::Null);

        let mut scalar = Context::new("POST /x")
            .with_auth_user("u3")
            .with_body(record(json!({"brand": 5})));
        let failure = capsule(controller.create_nested_for_auth_user("brand").call(&mut scalar).unwrap());
        assert_eq!(failure.status, 400);
    }

    #[test]
    fn test_update_for_auth_user_is_partial() {
        let mut existing = brand("b1", "u1", "Acme");
        existing.website = "https://acme.example".to_string();
        let (repo, controller) = brands(vec![existing]);
        let mut ctx = Context::new("PUT /brands/me")
            .with_auth_user("u1")
            .with_body(record(json!({
                "id": "hijack",
                "owner_id": "someone-else",
                "description": "Anvils and more"
            })));

        controller.update_for_auth_user().call(&mut ctx).unwrap();

        let stored = &repo.records()[0];
        assert_eq!(stored.id, "b1");
        assert_eq!(stored.owner_id, "u1");
        assert_eq!(stored.name, "Acme");
        assert_eq!(stored.website, "https://acme.example");
        assert_eq!(stored.description, "Anvils and more");
        assert_eq!(ctx.response.status, 200);
    }

    #[test]
    fn test_update_keeps_values_when_absent() {
        let mut existing = brand("b1", "u1", "Acme");
        existing.values = vec!["eco".to_string()];
        let (repo, controller) = brands(vec![existing]);
        let mut ctx = Context::new("PUT /brands/me")
            .with_auth_user("u1")
            .with_body(record(json!({"name": "Acme Corp"})));

        controller.update_for_auth_user().call(&mut ctx).unwrap();
        assert_eq!(repo.records()[0].values, vec!["eco".to_string()]);
    }

    #[test]
    fn test_upsert_creates_then_replaces() {
        let (repo, controller) = brands(vec![]);
        let upsert = controller.upsert_for_auth_user();

        let mut first = Context::new("PUT /x")
            .with_auth_user("u1")
            .with_body(record(json!({"name": "Acme"})));
        upsert.call(&mut first).unwrap();
        assert_eq!(first.response.status, 201);
        let id = repo.records()[0].id.clone();

        let mut second = Context::new("PUT /x")
            .with_auth_user("u1")
            .with_body(record(json!({"id": "forged", "email": "hi@acme.example"})));
        upsert.call(&mut second).unwrap();
        assert_eq!(second.response.status, 200);

        let stored = repo.records();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].owner_id, "u1");
        assert_eq!(stored[0].name, "");
        assert_eq!(stored[0].email, "hi@acme.example");
    }

    #[test]
    fn test_backend_failure_is_fatal() {
        let (repo, controller) = brands(vec![]);
        repo.fail_with("timeout");
        let mut ctx = Context::new("GET /brands");

        let err = controller.get_collection().call(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "repository error: timeout");
    }

    #[test]
    fn test_dto_rule_applies() {
        let repo = InMemoryRepository::new().with_records(vec![Influencer {
            id: "i1".to_string(),
            owner_id: "u1".to_string(),
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            ..Influencer::default()
        }]);
        let controller: Controller<Influencer, InfluencerDto> = Controller::new(Arc::new(repo), mapper());
        let mut ctx = Context::new("GET /influencers/me").with_auth_user("u1");

        controller.get_for_auth_user().call(&mut ctx).unwrap();
        assert_eq!(ctx.response.body["full_name"], json!("Ada Lovelace"));
    }

    #[test]
    fn test_command_names() {
        let (_, controller) = brands(vec![]);
        assert_eq!(controller.get_by_id().name(), "get_by_id<Brand>");
        assert_eq!(
            controller.create_nested_for_auth_user("brand").name(),
            "create_nested_for_auth_user<Brand>"
        );
    }
}
