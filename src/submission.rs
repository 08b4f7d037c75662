//! Submission state machine.
//!
//! `idle -> validating -> submitting -> succeeded | failed`, with
//! `failed -> validating` for retries. At most one submission is in flight
//! per instance: while `submitting`, further confirm actions are ignored.

use crate::error::SubmitError;
use crate::values::Values;
use crate::workflow::WorkflowConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle phase of a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

/// Receiving side of an instance's discard signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the owning instance is discarded.
    ///
    /// Pends forever if the sender goes away without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Sending side of the discard signal, held by the instance.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Input handed to a submit handler.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub workflow_id: String,
    pub values: Values,
    /// Fires when the instance is discarded
    pub cancel: CancelSignal,
}

/// Feature-specific submission logic.
///
/// Implementations typically resolve the caller's identity, persist a record
/// and call a [`TriggerClient`](crate::TriggerClient).
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    async fn submit(&self, request: SubmitRequest) -> Result<Value, SubmitError>;
}

/// Adapter turning an async closure into a [`SubmitHandler`].
pub struct FnSubmit<F> {
    f: F,
}

impl<F> FnSubmit<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> SubmitHandler for FnSubmit<F>
where
    F: Fn(SubmitRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, SubmitError>> + Send + 'static,
{
    async fn submit(&self, request: SubmitRequest) -> Result<Value, SubmitError> {
        (self.f)(request).await
    }
}

/// A submission that has been started but not yet run.
///
/// Owns everything it needs, so it can be awaited inline or spawned.
pub struct PendingSubmission {
    attempt: u32,
    handler: Arc<dyn SubmitHandler>,
    request: SubmitRequest,
}

impl PendingSubmission {
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Invoke the submit handler once.
    pub async fn run(self) -> SubmissionOutcome {
        let result = self.handler.submit(self.request).await;
        SubmissionOutcome {
            attempt: self.attempt,
            result,
        }
    }
}

impl fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("attempt", &self.attempt)
            .field("workflow_id", &self.request.workflow_id)
            .finish()
    }
}

/// Result of running a [`PendingSubmission`].
#[derive(Debug)]
pub struct SubmissionOutcome {
    attempt: u32,
    pub result: Result<Value, SubmitError>,
}

/// Phase bookkeeping for one workflow instance.
#[derive(Debug, Default)]
pub struct SubmissionMachine {
    phase: SubmissionPhase,
    attempt: u32,
    result: Option<Value>,
    error: Option<String>,
}

impl SubmissionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    /// Payload of the successful submission.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// User-facing message of the latest failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of submissions started so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Enter `validating` from `idle` or `failed`.
    ///
    /// Returns false (and changes nothing) in any other phase.
    pub fn begin_validation(&mut self) -> bool {
        match self.phase {
            SubmissionPhase::Idle | SubmissionPhase::Failed => {
                self.transition(SubmissionPhase::Validating);
                true
            }
            _ => false,
        }
    }

    /// Leave `validating` because the input is not ready.
    ///
    /// Any earlier submission failure is cleared.
    pub fn validation_failed(&mut self) {
        if self.phase == SubmissionPhase::Validating {
            self.error = None;
            self.transition(SubmissionPhase::Idle);
        }
    }

    /// Enter `submitting` and prepare the single handler invocation.
    ///
    /// Returns `None` unless the machine is `validating`.
    pub fn begin_submission(
        &mut self,
        config: &WorkflowConfig,
        values: &Values,
        cancel: CancelSignal,
    ) -> Option<PendingSubmission> {
        if self.phase != SubmissionPhase::Validating {
            return None;
        }
        let Some(handler) = config.submit_handler() else {
            self.transition(SubmissionPhase::Failed);
            self.error = Some(format!("Workflow '{}' cannot be submitted", config.id));
            return None;
        };

        self.attempt += 1;
        self.error = None;
        self.transition(SubmissionPhase::Submitting);

        tracing::info!(workflow = %config.id, attempt = self.attempt, "Submission started");

        Some(PendingSubmission {
            attempt: self.attempt,
            handler,
            request: SubmitRequest {
                workflow_id: config.id.clone(),
                values: values.clone(),
                cancel,
            },
        })
    }

    /// Apply the outcome of the in-flight submission and run hooks.
    ///
    /// Outcomes from an earlier attempt, or arriving outside `submitting`,
    /// are ignored. Returns the resulting phase.
    pub fn complete(
        &mut self,
        outcome: SubmissionOutcome,
        config: &WorkflowConfig,
        values: &Values,
    ) -> SubmissionPhase {
        if self.phase != SubmissionPhase::Submitting || outcome.attempt != self.attempt {
            tracing::debug!(
                workflow = %config.id,
                attempt = outcome.attempt,
                phase = ?self.phase,
                "Ignoring stale submission outcome"
            );
            return self.phase;
        }

        match outcome.result {
            Ok(result) => {
                tracing::info!(workflow = %config.id, attempt = self.attempt, "Submission succeeded");
                self.transition(SubmissionPhase::Succeeded);
                config.notify_success(&result, values);
                self.result = Some(result);
            }
            Err(err) => {
                tracing::warn!(
                    workflow = %config.id,
                    attempt = self.attempt,
                    code = ?err.code(),
                    error = %err,
                    "Submission failed"
                );
                self.transition(SubmissionPhase::Failed);
                self.error = Some(err.user_message());
                config.notify_error(&err, values);
            }
        }

        self.phase
    }

    fn transition(&mut self, to: SubmissionPhase) {
        tracing::debug!(from = ?self.phase, to = ?to, "Submission phase change");
        self.phase = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriggerError;
    use crate::field::Field;
    use crate::step::Step;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(result: Result<Value, SubmitError>) -> WorkflowConfig {
        WorkflowConfig::new("demo")
            .step(Step::new("only").field(Field::short_text("name")))
            .submit_fn(move |_| {
                let result = result.clone();
                async move { result }
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_path() {
        let config = config(Ok(json!({"jobId": "j1"})));
        let values = Values::new();
        let mut machine = SubmissionMachine::new();

        assert!(machine.begin_validation());
        assert_eq!(machine.phase(), SubmissionPhase::Validating);

        let pending = machine
            .begin_submission(&config, &values, CancelSignal::never())
            .unwrap();
        assert_eq!(machine.phase(), SubmissionPhase::Submitting);

        let phase = machine.complete(pending.run().await, &config, &values);
        assert_eq!(phase, SubmissionPhase::Succeeded);
        assert_eq!(machine.result(), Some(&json!({"jobId": "j1"})));
        assert!(!machine.begin_validation());
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let config = config(Err(TriggerError::network("ECONNRESET").into()));
        let values = Values::new();
        let mut machine = SubmissionMachine::new();

        machine.begin_validation();
        let pending = machine
            .begin_submission(&config, &values, CancelSignal::never())
            .unwrap();
        machine.complete(pending.run().await, &config, &values);

        assert_eq!(machine.phase(), SubmissionPhase::Failed);
        assert_eq!(machine.error(), Some("Network error: ECONNRESET"));

        assert!(machine.begin_validation());
        assert!(machine
            .begin_submission(&config, &values, CancelSignal::never())
            .is_some());
        assert_eq!(machine.attempts(), 2);
        assert_eq!(machine.error(), None);
    }

    #[tokio::test]
    async fn test_retry_failing_validation_clears_error() {
        let config = config(Err(SubmitError::Rejected("quota exceeded".to_string())));
        let values = Values::new();
        let mut machine = SubmissionMachine::new();

        machine.begin_validation();
        let pending = machine
            .begin_submission(&config, &values, CancelSignal::never())
            .unwrap();
        machine.complete(pending.run().await, &config, &values);
        assert_eq!(machine.error(), Some("quota exceeded"));

        assert!(machine.begin_validation());
        machine.validation_failed();
        assert_eq!(machine.phase(), SubmissionPhase::Idle);
        assert_eq!(machine.error(), None);
    }

    #[tokio::test]
    async fn test_second_begin_while_submitting_is_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let config = WorkflowConfig::new("demo")
            .step(Step::new("only"))
            .submit_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, SubmitError>(Value::Null) }
            })
            .build()
            .unwrap();
        let values = Values::new();
        let mut machine = SubmissionMachine::new();

        machine.begin_validation();
        let pending = machine
            .begin_submission(&config, &values, CancelSignal::never())
            .unwrap();

        assert!(!machine.begin_validation());
        assert!(machine
            .begin_submission(&config, &values, CancelSignal::never())
            .is_none());

        machine.complete(pending.run().await, &config, &values);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_outcome_is_ignored() {
        let config = config(Err(SubmitError::Rejected("first".to_string())));
        let values = Values::new();
        let mut machine = SubmissionMachine::new();

        machine.begin_validation();
        let first = machine
            .begin_submission(&config, &values, CancelSignal::never())
            .unwrap();
        let outcome = first.run().await;
        machine.complete(outcome, &config, &values);

        machine.begin_validation();
        let second = machine
            .begin_submission(&config, &values, CancelSignal::never())
            .unwrap();
        assert_eq!(second.attempt(), 2);

        let stale = SubmissionOutcome {
            attempt: 1,
            result: Ok(Value::Null),
        };
        assert_eq!(
            machine.complete(stale, &config, &values),
            SubmissionPhase::Submitting
        );
    }

    #[tokio::test]
    async fn test_cancel_signal() {
        let handle = CancelHandle::new();
        let signal = handle.signal();
        assert!(!signal.is_cancelled());

        handle.cancel();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }
}
