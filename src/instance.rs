//! A single session's run through a workflow.

use crate::context::WorkflowContext;
use crate::error::{ConfigError, NavigationError};
use crate::navigator::{Advance, StepNavigator};
use crate::step::Step;
use crate::submission::{
    CancelHandle, PendingSubmission, SubmissionMachine, SubmissionOutcome, SubmissionPhase,
};
use crate::tips::ActiveTip;
use crate::validator::{validate_submission, ValidationResult};
use crate::values::{is_present, Values};
use crate::workflow::WorkflowConfig;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of a confirm action.
#[derive(Debug)]
pub enum Confirm {
    /// Not on the last step: behaved like a "next" action.
    Navigated(Advance),
    /// The final validation failed; errors are published to the context.
    Invalid(ValidationResult),
    /// A submission started. Run it and hand the outcome to
    /// [`WorkflowInstance::complete`].
    Started(PendingSubmission),
    /// Nothing happened (already submitting or already succeeded).
    Ignored(SubmissionPhase),
}

/// One entry of the summary view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub step_id: String,
    pub field_id: String,
    pub label: String,
    pub value: Value,
}

/// An open workflow, exclusively owned by the session that created it.
///
/// Dropping (or [`discard`](Self::discard)ing) the instance fires the cancel
/// signal handed to any in-flight submission.
#[derive(Debug)]
pub struct WorkflowInstance {
    config: Arc<WorkflowConfig>,
    navigator: StepNavigator,
    machine: SubmissionMachine,
    cancel: CancelHandle,
}

impl WorkflowInstance {
    /// Open a new instance of a workflow.
    pub fn open(config: Arc<WorkflowConfig>) -> Result<Self, ConfigError> {
        let navigator = StepNavigator::new(config.clone())?;
        if config.submit_handler().is_none() {
            return Err(ConfigError::MissingSubmit(config.id.clone()));
        }

        tracing::info!(workflow = %config.id, steps = config.steps.len(), "Workflow opened");

        Ok(Self {
            navigator,
            machine: SubmissionMachine::new(),
            cancel: CancelHandle::new(),
            config,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn current_step(&self) -> &Step {
        self.navigator.current_step()
    }

    pub fn step_index(&self) -> usize {
        self.navigator.index()
    }

    pub fn values(&self) -> &Values {
        self.navigator.values()
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.machine.phase()
    }

    pub fn result(&self) -> Option<&Value> {
        self.machine.result()
    }

    pub fn error(&self) -> Option<&str> {
        self.machine.error()
    }

    pub fn context(&self) -> WorkflowContext {
        self.navigator.context()
    }

    /// Tips for the current state. Recomputed on every call.
    pub fn tips(&self) -> Vec<ActiveTip> {
        self.navigator.tips()
    }

    pub fn set_value(&mut self, field_id: &str, value: impl Into<Value>) -> Result<(), NavigationError> {
        self.navigator.set_value(field_id, value.into())
    }

    pub fn focus(&mut self, field_id: &str) -> Result<(), NavigationError> {
        self.navigator.focus(field_id)
    }

    pub fn blur(&mut self) {
        self.navigator.blur();
    }

    pub fn advance(&mut self) -> Advance {
        self.navigator.advance()
    }

    pub fn retreat(&mut self) -> bool {
        self.navigator.retreat()
    }

    pub fn jump_to(&mut self, step_id: &str) -> Result<Advance, NavigationError> {
        self.navigator.jump_to(step_id)
    }

    /// Go to the step owning a field and focus it (summary "edit" action).
    pub fn edit_field(&mut self, field_id: &str) -> Result<Advance, NavigationError> {
        let (index, _) = self
            .config
            .find_field(field_id)
            .ok_or_else(|| NavigationError::UnknownField(field_id.to_string()))?;
        let advance = self.navigator.jump_to_index(index)?;
        if self.navigator.index() == index {
            self.navigator.focus(field_id)?;
        }
        Ok(advance)
    }

    /// Present values in step and field order.
    pub fn summary(&self) -> Vec<SummaryEntry> {
        let values = self.navigator.values();
        self.config
            .steps
            .iter()
            .flat_map(|step| step.fields.iter().map(move |field| (step, field)))
            .filter(|(_, field)| is_present(values.get(&field.id)))
            .map(|(step, field)| SummaryEntry {
                step_id: step.id.clone(),
                field_id: field.id.clone(),
                label: field.display_name().to_string(),
                value: values[&field.id].clone(),
            })
            .collect()
    }

    /// The confirm action.
    ///
    /// Before the last step it advances. On the last step it validates and,
    /// if valid, starts the one submission allowed at a time.
    pub fn confirm(&mut self) -> Confirm {
        match self.machine.phase() {
            SubmissionPhase::Submitting | SubmissionPhase::Succeeded | SubmissionPhase::Validating => {
                return Confirm::Ignored(self.machine.phase());
            }
            SubmissionPhase::Idle | SubmissionPhase::Failed => {}
        }

        if !self.navigator.is_last_step() {
            return Confirm::Navigated(self.navigator.advance());
        }

        self.machine.begin_validation();
        let result = validate_submission(&self.config, self.navigator.values());
        self.navigator.publish(&result);
        if !result.valid {
            self.machine.validation_failed();
            return Confirm::Invalid(result);
        }

        match self.machine.begin_submission(
            &self.config,
            self.navigator.values(),
            self.cancel.signal(),
        ) {
            Some(pending) => Confirm::Started(pending),
            None => Confirm::Ignored(self.machine.phase()),
        }
    }

    /// Apply a submission outcome. Returns the resulting phase.
    pub fn complete(&mut self, outcome: SubmissionOutcome) -> SubmissionPhase {
        self.machine
            .complete(outcome, &self.config, self.navigator.values())
    }

    /// Confirm and, if a submission starts, run it to completion.
    pub async fn submit(&mut self) -> SubmissionPhase {
        match self.confirm() {
            Confirm::Started(pending) => {
                let outcome = pending.run().await;
                self.complete(outcome)
            }
            _ => self.machine.phase(),
        }
    }

    /// Close the instance, aborting any in-flight trigger call.
    pub fn discard(self) {
        tracing::info!(workflow = %self.config.id, phase = ?self.machine.phase(), "Workflow discarded");
    }
}

impl Drop for WorkflowInstance {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
