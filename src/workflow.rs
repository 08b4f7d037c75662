//! Workflow definition and builder.

use crate::error::{ConfigError, SubmitError};
use crate::field::Field;
use crate::step::{Step, StepBuilder};
use crate::submission::{FnSubmit, SubmitHandler, SubmitRequest};
use crate::tips::{TipRule, TipTrigger};
use crate::validator::{ValidationResult, Validator};
use crate::values::Values;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type SuccessHook = Arc<dyn Fn(&Value, &Values) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&SubmitError, &Values) + Send + Sync>;

/// A declarative multi-step workflow.
///
/// The data part (ids, steps, fields, tips) is serializable. Callbacks are
/// attached in code and never inspected by the engine, only called.
#[derive(Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow id
    pub id: String,

    /// Category tag (e.g. "investing", "reports")
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Steps in display order
    pub steps: Vec<Step>,

    /// Guidance rules in evaluation order
    #[serde(default)]
    pub tips: Vec<TipRule>,

    #[serde(skip)]
    submit: Option<Arc<dyn SubmitHandler>>,

    #[serde(skip)]
    on_success: Option<SuccessHook>,

    #[serde(skip)]
    on_error: Option<ErrorHook>,

    #[serde(skip)]
    cross_step_validator: Option<Validator>,
}

impl WorkflowConfig {
    /// Create a new workflow with an id.
    pub fn new(id: &str) -> WorkflowBuilder {
        WorkflowBuilder::new(id)
    }

    /// Attach the submit handler to a config loaded from data.
    pub fn with_submit<H: SubmitHandler + 'static>(mut self, handler: H) -> Self {
        self.submit = Some(Arc::new(handler));
        self
    }

    pub fn with_on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Values) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn with_on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubmitError, &Values) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn submit_handler(&self) -> Option<Arc<dyn SubmitHandler>> {
        self.submit.clone()
    }

    pub fn cross_step_validator(&self) -> Option<&Validator> {
        self.cross_step_validator.as_ref()
    }

    pub(crate) fn notify_success(&self, result: &Value, values: &Values) {
        if let Some(hook) = &self.on_success {
            hook(result, values);
        }
    }

    pub(crate) fn notify_error(&self, error: &SubmitError, values: &Values) {
        if let Some(hook) = &self.on_error {
            hook(error, values);
        }
    }

    /// Index of a step by id.
    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Find a field and the index of the step that owns it.
    pub fn find_field(&self, id: &str) -> Option<(usize, &Field)> {
        self.steps
            .iter()
            .enumerate()
            .find_map(|(index, step)| step.field(id).map(|f| (index, f)))
    }

    /// Check the structural invariants.
    ///
    /// Steps must be non-empty with unique ids, field ids unique across the
    /// whole workflow, numeric ranges consistent, and tip targets known.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }

        if self.steps.is_empty() {
            return Err(ConfigError::NoSteps(self.id.clone()));
        }

        let mut step_ids = HashSet::new();
        let mut field_ids = HashSet::new();

        for (i, step) in self.steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(ConfigError::EmptyStepId(i));
            }
            if !step_ids.insert(step.id.as_str()) {
                return Err(ConfigError::DuplicateStep(step.id.clone()));
            }
            for field in &step.fields {
                if !field_ids.insert(field.id.as_str()) {
                    return Err(ConfigError::DuplicateField(field.id.clone()));
                }
                field.check()?;
            }
        }

        for rule in &self.tips {
            let Some(target) = &rule.target else {
                continue;
            };
            let (kind, known) = match rule.trigger {
                TipTrigger::StepChange => ("step", step_ids.contains(target.as_str())),
                TipTrigger::FieldFocus | TipTrigger::FieldValue => {
                    ("field", field_ids.contains(target.as_str()))
                }
                TipTrigger::ValidationState => continue,
            };
            if !known {
                return Err(ConfigError::UnknownTipTarget {
                    rule: rule.id.clone(),
                    kind,
                    target: target.clone(),
                });
            }
        }

        Ok(())
    }

    /// Initial values taken from field defaults.
    pub fn default_values(&self) -> Values {
        self.steps
            .iter()
            .flat_map(|s| s.fields.iter())
            .filter_map(|f| f.default_value.clone().map(|v| (f.id.clone(), v)))
            .collect()
    }
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("steps", &self.steps)
            .field("tips", &self.tips)
            .field("submit", &self.submit.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Builder for creating workflows.
#[derive(Clone)]
pub struct WorkflowBuilder {
    workflow: WorkflowConfig,
}

impl WorkflowBuilder {
    /// Create a new workflow builder.
    pub fn new(id: &str) -> Self {
        Self {
            workflow: WorkflowConfig {
                id: id.to_string(),
                category: None,
                title: None,
                description: None,
                steps: Vec::new(),
                tips: Vec::new(),
                submit: None,
                on_success: None,
                on_error: None,
                cross_step_validator: None,
            },
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.workflow.category = Some(category.to_string());
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.workflow.title = Some(title.to_string());
        self
    }

    /// Set the workflow description.
    pub fn description(mut self, desc: &str) -> Self {
        self.workflow.description = Some(desc.to_string());
        self
    }

    /// Add a step to the workflow.
    pub fn add<S: Into<Step>>(mut self, step: S) -> Self {
        self.workflow.steps.push(step.into());
        self
    }

    /// Add a step builder (convenience).
    pub fn step(self, step: StepBuilder) -> Self {
        self.add(step.build())
    }

    /// Add a guidance rule.
    pub fn tip(mut self, rule: TipRule) -> Self {
        self.workflow.tips.push(rule);
        self
    }

    /// Set the submit handler.
    pub fn submit<H: SubmitHandler + 'static>(mut self, handler: H) -> Self {
        self.workflow.submit = Some(Arc::new(handler));
        self
    }

    /// Set the submit handler from an async closure.
    pub fn submit_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(SubmitRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, SubmitError>> + Send + 'static,
    {
        self.submit(FnSubmit::new(f))
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Values) + Send + Sync + 'static,
    {
        self.workflow.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&SubmitError, &Values) + Send + Sync + 'static,
    {
        self.workflow.on_error = Some(Arc::new(f));
        self
    }

    /// Validator run over all values before submission.
    pub fn validate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Values) -> ValidationResult + Send + Sync + 'static,
    {
        self.workflow.cross_step_validator = Some(Validator::new(f));
        self
    }

    /// Build the workflow, checking its invariants.
    pub fn build(self) -> Result<WorkflowConfig, ConfigError> {
        self.workflow.check()?;
        Ok(self.workflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use serde_json::json;

    fn two_steps() -> WorkflowBuilder {
        WorkflowConfig::new("invest")
            .category("investing")
            .step(Step::new("amount").field(Field::numeric_input("amount").required()))
            .step(Step::new("risk").field(Field::single_choice("risk").default_value("low")))
    }

    #[test]
    fn test_workflow_builder() {
        let workflow = two_steps()
            .description("Invest some money")
            .tip(TipRule::on_step("welcome", "Welcome").target("amount"))
            .submit_fn(|_| async { Ok::<_, SubmitError>(json!({"ok": true})) })
            .build()
            .unwrap();

        assert_eq!(workflow.id, "invest");
        assert_eq!(workflow.category.as_deref(), Some("investing"));
        assert_eq!(workflow.steps.len(), 2);
        assert_eq!(workflow.step_index("risk"), Some(1));
        assert_eq!(workflow.find_field("risk").map(|(i, _)| i), Some(1));
        assert!(workflow.submit_handler().is_some());
        assert_eq!(workflow.default_values().get("risk"), Some(&json!("low")));
    }

    #[test]
    fn test_rejects_empty_steps() {
        let err = WorkflowConfig::new("empty").build().unwrap_err();
        assert_eq!(err, ConfigError::NoSteps("empty".to_string()));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = two_steps()
            .step(Step::new("amount"))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateStep("amount".to_string()));

        let err = two_steps()
            .step(Step::new("extra").field(Field::short_text("risk")))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateField("risk".to_string()));
    }

    #[test]
    fn test_rejects_unknown_tip_target() {
        let err = two_steps()
            .tip(TipRule::on_focus("t", "text").target("nope"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTipTarget { kind: "field", .. }));
    }

    #[test]
    fn test_callbacks_skipped_in_serialization() {
        let workflow = two_steps()
            .on_success(|_, _| {})
            .submit_fn(|_| async { Ok::<_, SubmitError>(Value::Null) })
            .build()
            .unwrap();

        let encoded = serde_json::to_value(&workflow).unwrap();
        assert!(encoded.get("submit").is_none());

        let decoded: WorkflowConfig = serde_json::from_value(encoded).unwrap();
        assert!(decoded.submit_handler().is_none());
        assert_eq!(decoded.steps.len(), 2);
    }
}
