use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// A persisted record with an identifier and an optional owning identity
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human readable entity name used in messages
    const ENTITY: &'static str;

    /// Whether an identity may own at most one record of this type
    const UNIQUE_PER_OWNER: bool;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn owner_id(&self) -> Option<&str>;
    fn set_owner_id(&mut self, owner_id: String);
}

/// Errors reported by a repository
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists for '{owner}'")]
    AlreadyExists { entity: &'static str, owner: String },

    #[error("{0}")]
    Backend(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn already_exists(entity: &'static str, owner: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            owner: owner.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors reported by the image store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("invalid image payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Backend(String),
}

/// Errors reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("unknown identity '{0}'")]
    UnknownUser(String),

    #[error("{0}")]
    Backend(String),
}

/// Trait for relational storage of one entity type
///
/// This keeps commands decoupled from the persistence layer. The
/// in-memory implementation below is used in tests and local runs.
pub trait Repository<T: Entity>: Send + Sync {
    fn load_by_id(&self, id: &str) -> Result<T, RepositoryError>;

    fn load_collection(&self) -> Result<Vec<T>, RepositoryError>;

    /// Load the record owned by an identity
    fn load_for_auth_user(&self, auth_user_id: &str) -> Result<T, RepositoryError>;

    fn load_collection_for_auth_user(&self, auth_user_id: &str) -> Result<Vec<T>, RepositoryError>;

    /// Check whether an identity owns a record without materializing it
    fn exists_for_auth_user(&self, auth_user_id: &str) -> Result<bool, RepositoryError> {
        match self.load_for_auth_user(auth_user_id) {
            Ok(_) => Ok(true),
            Err(RepositoryError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Insert a record owned by an identity
    ///
    /// Fails with `AlreadyExists` when the entity is unique per owner and
    /// the identity already owns one.
    fn write_new_for_auth_user(&self, auth_user_id: &str, record: T) -> Result<T, RepositoryError>;

    /// Insert a record as-is, assigning an id when it has none
    fn write_new(&self, record: T) -> Result<T, RepositoryError>;

    /// Replace an existing record with the same id
    fn write(&self, record: T) -> Result<T, RepositoryError>;

    /// Flush pending writes
    fn save(&self) -> Result<(), RepositoryError>;
}

/// Trait for binary image storage
pub trait ImageRepository: Send + Sync {
    /// Store a base64 payload under a path, returning its storage key
    fn upload(&self, path: &str, base64_payload: &str) -> Result<String, StorageError>;

    fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// A user as known to the identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthUser {
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub brand_id: Option<String>,
    pub influencer_id: Option<String>,
}

/// Trait for identity provider lookups and claim updates
pub trait AuthUserRepository: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<AuthUser, IdentityError>;

    fn update_brand_claims(&self, user: &AuthUser, brand_id: &str) -> Result<(), IdentityError>;

    fn update_influencer_claims(&self, user: &AuthUser, influencer_id: &str) -> Result<(), IdentityError>;
}

// In-memory implementations

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::backend("in-memory store lock poisoned"))
}

/// Most recent calls kept by an in-memory repository
pub const CALL_LOG_CAPACITY: usize = 1024;

/// In-memory repository
///
/// Records are kept in insertion order. Trait calls are logged by method
/// name so tests can assert which operations ran; only the latest
/// [`CALL_LOG_CAPACITY`] calls are kept.
#[derive(Clone)]
pub struct InMemoryRepository<T> {
    records: Arc<Mutex<Vec<T>>>,
    calls: Arc<Mutex<VecDeque<&'static str>>>,
    saves: Arc<Mutex<usize>>,
    failure: Arc<Mutex<Option<String>>>,
    id_generator: Arc<dyn Fn() -> String + Send + Sync>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for InMemoryRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("records", &self.records)
            .field("id_generator", &"<function>")
            .finish()
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(VecDeque::new())),
            saves: Arc::new(Mutex::new(0)),
            failure: Arc::new(Mutex::new(None)),
            id_generator: Arc::new(|| uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Seed the repository with records
    pub fn with_records(self, records: Vec<T>) -> Self {
        if let Ok(mut stored) = self.records.lock() {
            stored.extend(records);
        }
        self
    }

    /// Set a custom ID generator
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Arc::new(generator);
        self
    }

    /// Make every subsequent call fail with a backend error
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.into());
        }
    }

    /// Names of the most recent trait methods called, oldest first
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| *s).unwrap_or_default()
    }

    pub fn records(&self) -> Vec<T> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn record_call(&self, method: &'static str) -> Result<(), RepositoryError> {
        {
            let mut calls = lock(&self.calls)?;
            if calls.len() == CALL_LOG_CAPACITY {
                calls.pop_front();
            }
            calls.push_back(method);
        }
        match lock(&self.failure)?.as_ref() {
            Some(message) => Err(RepositoryError::backend(message.clone())),
            None => Ok(()),
        }
    }

    fn owned_by<'a>(records: &'a [T], auth_user_id: &str) -> impl Iterator<Item = &'a T> {
        let owner = auth_user_id.to_string();
        records
            .iter()
            .filter(move |r| r.owner_id() == Some(owner.as_str()))
    }

    fn insert(&self, records: &mut Vec<T>, mut record: T) -> T {
        if record.id().is_empty() {
            record.set_id((self.id_generator)());
        }
        records.push(record.clone());
        record
    }
}

impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    fn load_by_id(&self, id: &str) -> Result<T, RepositoryError> {
        self.record_call("load_by_id")?;
        lock(&self.records)?
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(T::ENTITY, id))
    }

    fn load_collection(&self) -> Result<Vec<T>, RepositoryError> {
        self.record_call("load_collection")?;
        Ok(lock(&self.records)?.clone())
    }

    fn load_for_auth_user(&self, auth_user_id: &str) -> Result<T, RepositoryError> {
        self.record_call("load_for_auth_user")?;
        let records = lock(&self.records)?;
        Self::owned_by(&records, auth_user_id)
            .next()
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(T::ENTITY, auth_user_id))
    }

    fn load_collection_for_auth_user(&self, auth_user_id: &str) -> Result<Vec<T>, RepositoryError> {
        self.record_call("load_collection_for_auth_user")?;
        let records = lock(&self.records)?;
        Ok(Self::owned_by(&records, auth_user_id).cloned().collect())
    }

    fn exists_for_auth_user(&self, auth_user_id: &str) -> Result<bool, RepositoryError> {
        self.record_call("exists_for_auth_user")?;
        let records = lock(&self.records)?;
        Ok(Self::owned_by(&records, auth_user_id).next().is_some())
    }

    fn write_new_for_auth_user(&self, auth_user_id: &str, mut record: T) -> Result<T, RepositoryError> {
        self.record_call("write_new_for_auth_user")?;
        let mut records = lock(&self.records)?;
        if T::UNIQUE_PER_OWNER && Self::owned_by(&records, auth_user_id).next().is_some() {
            return Err(RepositoryError::already_exists(T::ENTITY, auth_user_id));
        }
        record.set_owner_id(auth_user_id.to_string());
        Ok(self.insert(&mut records, record))
    }

    fn write_new(&self, record: T) -> Result<T, RepositoryError> {
        self.record_call("write_new")?;
        let mut records = lock(&self.records)?;
        Ok(self.insert(&mut records, record))
    }

    fn write(&self, record: T) -> Result<T, RepositoryError> {
        self.record_call("write")?;
        let mut records = lock(&self.records)?;
        let slot = records
            .iter_mut()
            .find(|r| r.id() == record.id())
            .ok_or_else(|| RepositoryError::not_found(T::ENTITY, record.id()))?;
        *slot = record.clone();
        Ok(record)
    }

    fn save(&self) -> Result<(), RepositoryError> {
        self.record_call("save")?;
        *lock(&self.saves)? += 1;
        Ok(())
    }
}

/// In-memory image store that keeps decoded bytes by path
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageRepository {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryImageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode a base64 image payload, accepting an optional data URL prefix
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, StorageError> {
    let data = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    STANDARD
        .decode(data.trim())
        .map_err(|e| StorageError::InvalidPayload(e.to_string()))
}

impl ImageRepository for InMemoryImageRepository {
    fn upload(&self, path: &str, base64_payload: &str) -> Result<String, StorageError> {
        let bytes = decode_image_payload(base64_payload)?;
        self.objects
            .lock()
            .map_err(|_| StorageError::Backend("image store lock poisoned".to_string()))?
            .insert(path.to_string(), bytes);
        Ok(path.to_string())
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Backend("image store lock poisoned".to_string()))?
            .remove(path);
        Ok(())
    }
}

/// In-memory identity provider
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthUserRepository {
    users: Arc<Mutex<HashMap<String, AuthUser>>>,
}

impl InMemoryAuthUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: AuthUser) -> Self {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.id.clone(), user);
        }
        self
    }

    fn update<F>(&self, user: &AuthUser, apply: F) -> Result<(), IdentityError>
    where
        F: FnOnce(&mut AuthUser),
    {
        let mut users = self
            .users
            .lock()
            .map_err(|_| IdentityError::Backend("identity store lock poisoned".to_string()))?;
        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| IdentityError::UnknownUser(user.id.clone()))?;
        apply(stored);
        Ok(())
    }
}

impl AuthUserRepository for InMemoryAuthUserRepository {
    fn get_by_id(&self, id: &str) -> Result<AuthUser, IdentityError> {
        self.users
            .lock()
            .map_err(|_| IdentityError::Backend("identity store lock poisoned".to_string()))?
            .get(id)
            .cloned()
            .ok_or_else(|| IdentityError::UnknownUser(id.to_string()))
    }

    fn update_brand_claims(&self, user: &AuthUser, brand_id: &str) -> Result<(), IdentityError> {
        self.update(user, |stored| stored.brand_id = Some(brand_id.to_string()))
    }

    fn update_influencer_claims(&self, user: &AuthUser, influencer_id: &str) -> Result<(), IdentityError> {
        self.update(user, |stored| stored.influencer_id = Some(influencer_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Note {
        id: String,
        owner: Option<String>,
        text: String,
    }

    impl Entity for Note {
        const ENTITY: &'static str = "Note";
        const UNIQUE_PER_OWNER: bool = true;

        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
        fn owner_id(&self) -> Option<&str> {
            self.owner.as_deref()
        }
        fn set_owner_id(&mut self, owner_id: String) {
            self.owner = Some(owner_id);
        }
    }

    fn note(text: &str) -> Note {
        Note {
            text: text.to_string(),
            ..Note::default()
        }
    }

    #[test]
    fn test_write_new_for_auth_user_assigns_id_and_owner() {
        let repo = InMemoryRepository::<Note>::new().with_id_generator(|| "n1".to_string());
        let written = repo.write_new_for_auth_user("user-1", note("hello")).unwrap();

        assert_eq!(written.id, "n1");
        assert_eq!(written.owner.as_deref(), Some("user-1"));
        assert_eq!(repo.load_for_auth_user("user-1").unwrap(), written);
    }

    #[test]
    fn test_write_new_for_auth_user_rejects_second_record() {
        let repo = InMemoryRepository::<Note>::new();
        repo.write_new_for_auth_user("user-1", note("a")).unwrap();

        let err = repo.write_new_for_auth_user("user-1", note("b")).unwrap_err();
        assert_eq!(err, RepositoryError::already_exists("Note", "user-1"));
    }

    #[test]
    fn test_load_by_id_not_found() {
        let repo = InMemoryRepository::<Note>::new();
        assert_eq!(
            repo.load_by_id("missing").unwrap_err(),
            RepositoryError::not_found("Note", "missing")
        );
    }

    #[test]
    fn test_write_replaces_existing() {
        let repo = InMemoryRepository::<Note>::new();
        let mut written = repo.write_new(note("draft")).unwrap();
        written.text = "final".to_string();
        repo.write(written.clone()).unwrap();

        assert_eq!(repo.load_by_id(&written.id).unwrap().text, "final");
    }

    #[test]
    fn test_exists_for_auth_user() {
        let repo = InMemoryRepository::<Note>::new();
        assert!(!repo.exists_for_auth_user("user-1").unwrap());
        repo.write_new_for_auth_user("user-1", note("a")).unwrap();
        assert!(repo.exists_for_auth_user("user-1").unwrap());
    }

    #[test]
    fn test_calls_are_recorded_and_failures_injected() {
        let repo = InMemoryRepository::<Note>::new();
        repo.load_collection().unwrap();
        repo.save().unwrap();
        repo.fail_with("database offline");

        assert_eq!(
            repo.load_collection().unwrap_err(),
            RepositoryError::backend("database offline")
        );
        assert_eq!(repo.calls(), vec!["load_collection", "save", "load_collection"]);
        assert_eq!(repo.save_count(), 1);
    }

    #[test]
    fn test_call_log_keeps_latest_calls() {
        let repo = InMemoryRepository::<Note>::new();
        for _ in 0..CALL_LOG_CAPACITY {
            repo.load_collection().unwrap();
        }
        repo.save().unwrap();

        let calls = repo.calls();
        assert_eq!(calls.len(), CALL_LOG_CAPACITY);
        assert_eq!(calls.last(), Some(&"save"));
        assert_eq!(calls[0], "load_collection");
    }

    #[test]
    fn test_image_upload_decodes_payload() {
        let images = InMemoryImageRepository::new();
        let key = images.upload("brands/u1/logo", "aGVsbG8=").unwrap();

        assert_eq!(key, "brands/u1/logo");
        assert_eq!(images.get(&key), Some(b"hello".to_vec()));

        images.delete(&key).unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn test_image_upload_accepts_data_url() {
        let images = InMemoryImageRepository::new();
        images
            .upload("logo", "data:image/png;base64,aGVsbG8=")
            .unwrap();
        assert_eq!(images.get("logo"), Some(b"hello".to_vec()));
    }

    #[test]
    fn test_image_upload_rejects_invalid_base64() {
        let images = InMemoryImageRepository::new();
        let err = images.upload("logo", "not base64!!").unwrap_err();
        assert!(matches!(err, StorageError::InvalidPayload(_)));
    }

    #[test]
    fn test_claim_updates() {
        let identity = InMemoryAuthUserRepository::new().with_user(AuthUser {
            id: "user-1".to_string(),
            given_name: "Ada".to_string(),
            family_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..AuthUser::default()
        });

        let user = identity.get_by_id("user-1").unwrap();
        identity.update_brand_claims(&user, "brand-1").unwrap();
        identity.update_influencer_claims(&user, "inf-1").unwrap();

        let updated = identity.get_by_id("user-1").unwrap();
        assert_eq!(updated.brand_id.as_deref(), Some("brand-1"));
        assert_eq!(updated.influencer_id.as_deref(), Some("inf-1"));
        assert!(matches!(
            identity.get_by_id("nobody"),
            Err(IdentityError::UnknownUser(_))
        ));
    }
}
