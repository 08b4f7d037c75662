//! Record-backed webhook jobs.
//!
//! [`JobSubmitter`] is a ready-made [`SubmitHandler`]: it resolves the
//! caller, creates a `pending` record, triggers the webhook with the record
//! id as correlating identifier, and marks the record `processing` or
//! `failed`. [`JobTracker`] follows the record afterwards.

use crate::error::{ServiceError, SubmitError};
use crate::services::{AuthService, PersistenceService, Record, StatusUpdate};
use crate::submission::{SubmitHandler, SubmitRequest};
use crate::trigger::TriggerClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Lifecycle of the asynchronous job behind a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Submit handler that persists a record and triggers a webhook job.
#[derive(Clone)]
pub struct JobSubmitter {
    feature: String,
    auth: Arc<dyn AuthService>,
    store: Arc<dyn PersistenceService>,
    trigger: TriggerClient,
}

impl JobSubmitter {
    pub fn new(
        feature: &str,
        auth: Arc<dyn AuthService>,
        store: Arc<dyn PersistenceService>,
        trigger: TriggerClient,
    ) -> Self {
        Self {
            feature: feature.to_string(),
            auth,
            store,
            trigger,
        }
    }
}

#[async_trait]
impl SubmitHandler for JobSubmitter {
    async fn submit(&self, request: SubmitRequest) -> Result<Value, SubmitError> {
        let identity = self
            .auth
            .resolve_current_identity()
            .await?
            .ok_or(SubmitError::Unauthorized)?;

        let fields: Map<String, Value> = request.values.into_iter().collect();
        let record_id = self.store.create_record(&identity.id, fields.clone()).await?;

        tracing::info!(
            feature = %self.feature,
            workflow = %request.workflow_id,
            record = %record_id,
            "Record created, triggering job"
        );

        let mut payload = fields;
        payload.insert("userId".to_string(), Value::String(identity.id.clone()));
        payload.insert("recordId".to_string(), Value::String(record_id.clone()));
        payload.insert("feature".to_string(), Value::String(self.feature.clone()));

        match self.trigger.trigger_with_cancel(&payload, &request.cancel).await {
            Ok(response) => {
                self.store
                    .update_record_status(&record_id, StatusUpdate::new(JobStatus::Processing))
                    .await?;
                Ok(json!({
                    "recordId": record_id,
                    "status": JobStatus::Processing,
                    "response": response.payload,
                }))
            }
            Err(err) => {
                if let Err(update_err) = self
                    .store
                    .update_record_status(&record_id, StatusUpdate::failed(err.message.clone()))
                    .await
                {
                    tracing::warn!(record = %record_id, error = %update_err, "Failed to mark record as failed");
                }
                Err(err.into())
            }
        }
    }
}

/// Reads and finalizes job records.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn PersistenceService>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn PersistenceService>) -> Self {
        Self { store }
    }

    /// Current record for an owner.
    pub async fn record(&self, record_id: &str, owner_id: &str) -> Result<Record, ServiceError> {
        self.store.get_record(record_id, owner_id).await
    }

    pub async fn status(&self, record_id: &str, owner_id: &str) -> Result<JobStatus, ServiceError> {
        Ok(self.record(record_id, owner_id).await?.status)
    }

    /// Record the job's final outcome, e.g. from the job's callback.
    ///
    /// Terminal records are left untouched; returns the status after the call.
    pub async fn finish(
        &self,
        record_id: &str,
        owner_id: &str,
        outcome: Result<(), String>,
    ) -> Result<JobStatus, ServiceError> {
        let current = self.status(record_id, owner_id).await?;
        if current.is_terminal() {
            return Ok(current);
        }

        let update = match outcome {
            Ok(()) => StatusUpdate::new(JobStatus::Completed),
            Err(message) => StatusUpdate::failed(message),
        };
        let status = update.status;
        self.store.update_record_status(record_id, update).await?;

        tracing::info!(record = %record_id, status = ?status, "Job finished");
        Ok(status)
    }
}
