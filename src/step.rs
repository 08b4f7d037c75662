//! Workflow step definitions.

use crate::field::Field;
use crate::validator::{ValidationResult, Validator};
use crate::values::Values;
use serde::{Deserialize, Serialize};

/// A single step in a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step id, unique within the workflow
    pub id: String,

    /// Title shown above the step
    #[serde(default)]
    pub title: Option<String>,

    /// Description for the step header
    #[serde(default)]
    pub description: Option<String>,

    /// Fields collected on this step, in display order
    #[serde(default)]
    pub fields: Vec<Field>,

    /// Check `min`/`max`/`options` in addition to required fields
    #[serde(default = "default_enforce_constraints")]
    pub enforce_constraints: bool,

    /// Custom validator, attached in code
    #[serde(skip)]
    pub validator: Option<Validator>,
}

fn default_enforce_constraints() -> bool {
    true
}

impl Step {
    /// Create a new step with an id.
    pub fn new(id: &str) -> StepBuilder {
        StepBuilder::new(id)
    }

    /// Look up a field on this step.
    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// Builder for creating workflow steps.
#[derive(Debug, Clone)]
pub struct StepBuilder {
    step: Step,
}

impl StepBuilder {
    /// Create a new step builder.
    pub fn new(id: &str) -> Self {
        Self {
            step: Step {
                id: id.to_string(),
                title: None,
                description: None,
                fields: Vec::new(),
                enforce_constraints: true,
                validator: None,
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.step.title = Some(title.to_string());
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.step.description = Some(desc.to_string());
        self
    }

    /// Add a field.
    pub fn field<F: Into<Field>>(mut self, field: F) -> Self {
        self.step.fields.push(field.into());
        self
    }

    /// Stop reporting `min`/`max`/`options` violations.
    ///
    /// Required fields and the custom validator are still checked.
    pub fn skip_constraints(mut self) -> Self {
        self.step.enforce_constraints = false;
        self
    }

    /// Attach a custom validator.
    ///
    /// Its errors are merged with the required-field check.
    pub fn validate_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Values) -> ValidationResult + Send + Sync + 'static,
    {
        self.step.validator = Some(Validator::new(f));
        self
    }

    /// Build the step.
    pub fn build(self) -> Step {
        self.step
    }
}

impl From<StepBuilder> for Step {
    fn from(builder: StepBuilder) -> Self {
        builder.build()
    }
}
