//! # guided-workflow
//!
//! Declarative multi-step input workflows.
//!
//! A [`WorkflowConfig`] describes ordered steps of fields, validation rules,
//! contextual tips and a submit handler. A [`WorkflowInstance`] walks one
//! session through it, recomputing tips on every change, and submits the
//! collected values exactly once per confirm, typically through a
//! [`TriggerClient`] that starts an asynchronous webhook job.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guided_workflow::{Field, Step, SubmissionPhase, TipRule, WorkflowConfig, WorkflowInstance};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = WorkflowConfig::new("fund-account")
//!     .category("investing")
//!     .step(
//!         Step::new("amount")
//!             .field(Field::numeric_input("amount").label("Amount").required().min(100.0)),
//!     )
//!     .tip(TipRule::on_focus("amount-help", "The minimum deposit is 100").target("amount"))
//!     .submit_fn(|request| async move {
//!         Ok::<_, guided_workflow::SubmitError>(serde_json::json!({"amount": request.values["amount"]}))
//!     })
//!     .build()?;
//!
//! let mut instance = WorkflowInstance::open(Arc::new(config))?;
//! instance.focus("amount")?;
//! instance.set_value("amount", 250)?;
//!
//! let phase = instance.submit().await;
//! assert_eq!(phase, SubmissionPhase::Succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## YAML Definition
//!
//! ```yaml
//! id: fund-account
//! category: investing
//! steps:
//!   - id: amount
//!     fields:
//!       - id: amount
//!         type: numeric-input
//!         label: Amount
//!         required: true
//!         min: 100
//! tips:
//!   - id: amount-help
//!     trigger: field-focus
//!     target: amount
//!     content: "The minimum deposit is 100"
//! ```

mod context;
mod error;
mod field;
mod instance;
mod job;
mod navigator;
mod services;
mod step;
mod submission;
mod tips;
mod trigger;
mod validator;
mod values;
mod workflow;
pub mod yaml;

pub use context::WorkflowContext;
pub use error::{
    ConfigError, NavigationError, ServiceError, SubmitError, TriggerError, TriggerErrorKind,
    CODE_CANCELLED, CODE_INVALID_JSON, CODE_NETWORK_ERROR, CODE_TIMEOUT, CODE_WEBHOOK_ERROR,
};
pub use field::{Field, FieldBuilder, FieldKind, FieldOption};
pub use instance::{Confirm, SummaryEntry, WorkflowInstance};
pub use job::{JobStatus, JobSubmitter, JobTracker};
pub use navigator::{Advance, StepNavigator};
pub use services::{
    storage_path, AuthService, Identity, MemoryObjectStorage, MemoryStore, ObjectStorage,
    PersistenceService, Record, StaticAuth, StatusUpdate, StorageConfig, StoredObject,
    DEFAULT_BUCKET,
};
pub use step::{Step, StepBuilder};
pub use submission::{
    CancelHandle, CancelSignal, FnSubmit, PendingSubmission, SubmissionMachine,
    SubmissionOutcome, SubmissionPhase, SubmitHandler, SubmitRequest,
};
pub use tips::{evaluate, ActiveTip, Severity, TipCondition, TipContent, TipRule, TipTrigger};
pub use trigger::{TriggerClient, TriggerConfig, TriggerResponse, DEFAULT_WEBHOOK_URL};
pub use validator::{validate, validate_submission, ValidationResult, Validator};
pub use values::{is_present, Values};
pub use workflow::{WorkflowBuilder, WorkflowConfig};
pub use yaml::parse_yaml;

/// Re-export common types
pub use serde_json::Value;
