//! External collaborators used by submit handlers.
//!
//! The engine never calls these itself. Feature submit handlers (such as
//! [`JobSubmitter`](crate::JobSubmitter)) resolve the caller, persist a
//! record and store assets through them. In-memory implementations are
//! provided for embedding and tests.

use crate::error::ServiceError;
use crate::job::JobStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default bucket for stored assets.
pub const DEFAULT_BUCKET: &str = "workflow-assets";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            email: None,
        }
    }
}

/// A persisted workflow submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub owner_id: String,
    pub fields: Map<String, Value>,
    pub status: JobStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status change applied to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: JobStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            error_message: Some(message.into()),
        }
    }
}

/// Resolves the current caller.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn resolve_current_identity(&self) -> Result<Option<Identity>, ServiceError>;
}

/// Record storage keyed by owner.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Create a record with status `pending`. Returns its id.
    async fn create_record(
        &self,
        owner_id: &str,
        fields: Map<String, Value>,
    ) -> Result<String, ServiceError>;

    async fn update_record_status(&self, id: &str, update: StatusUpdate) -> Result<(), ServiceError>;

    /// Fetch a record owned by `owner_id`. Records of other owners are `NotFound`.
    async fn get_record(&self, id: &str, owner_id: &str) -> Result<Record, ServiceError>;
}

/// Binary asset storage addressed by path.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, ServiceError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Location of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub size: usize,
}

/// Storage path for an asset belonging to a record.
pub fn storage_path(owner_id: &str, record_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", owner_id, record_id, file_name.trim_start_matches('/'))
}

/// Auth service returning a fixed identity (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    identity: Option<Identity>,
}

impl StaticAuth {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl AuthService for StaticAuth {
    async fn resolve_current_identity(&self) -> Result<Option<Identity>, ServiceError> {
        Ok(self.identity.clone())
    }
}

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// All records of one owner.
    pub async fn records_of(&self, owner_id: &str) -> Vec<Record> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PersistenceService for MemoryStore {
    async fn create_record(
        &self,
        owner_id: &str,
        fields: Map<String, Value>,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let record = Record {
            id: id.clone(),
            owner_id: owner_id.to_string(),
            fields,
            status: JobStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.records.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn update_record_status(&self, id: &str, update: StatusUpdate) -> Result<(), ServiceError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(format!("record {}", id)))?;
        record.status = update.status;
        record.error_message = update.error_message;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get_record(&self, id: &str, owner_id: &str) -> Result<Record, ServiceError> {
        self.records
            .read()
            .await
            .get(id)
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("record {}", id)))
    }
}

/// Configuration for object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
        }
    }
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

/// In-memory object storage.
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    config: StorageConfig,
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryObjectStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, ServiceError> {
        let stored = StoredObject {
            bucket: self.config.bucket.clone(),
            path: path.to_string(),
            content_type: content_type.to_string(),
            size: bytes.len(),
        };
        self.objects
            .write()
            .await
            .insert(path.to_string(), (content_type.to_string(), bytes));
        Ok(stored)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, ServiceError> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("object {}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_lifecycle() {
        let store = MemoryStore::new();
        let mut fields = Map::new();
        fields.insert("amount".to_string(), json!(150));

        let id = store.create_record("user-1", fields).await.unwrap();
        let record = store.get_record(&id, "user-1").await.unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.fields["amount"], json!(150));

        store
            .update_record_status(&id, StatusUpdate::failed("quota exceeded"))
            .await
            .unwrap();
        let record = store.get_record(&id, "user-1").await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn test_cross_owner_access_is_not_found() {
        let store = MemoryStore::new();
        let id = store.create_record("user-1", Map::new()).await.unwrap();

        assert!(matches!(
            store.get_record(&id, "user-2").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            store.update_record_status("missing", StatusUpdate::new(JobStatus::Completed)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_static_auth() {
        let auth = StaticAuth::signed_in(Identity::new("user-1"));
        assert_eq!(
            auth.resolve_current_identity().await.unwrap().map(|i| i.id),
            Some("user-1".to_string())
        );
        assert_eq!(StaticAuth::anonymous().resolve_current_identity().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_object_storage() {
        let storage = MemoryObjectStorage::new(StorageConfig::default());
        let path = storage_path("user-1", "rec-1", "/avatar.png");
        assert_eq!(path, "user-1/rec-1/avatar.png");

        let stored = storage.put(&path, vec![1, 2, 3], "image/png").await.unwrap();
        assert_eq!(stored.bucket, DEFAULT_BUCKET);
        assert_eq!(stored.size, 3);
        assert_eq!(storage.get(&path).await.unwrap(), vec![1, 2, 3]);
        assert!(storage.get("nope").await.is_err());
    }
}
