//! Step navigation for a workflow instance.

use crate::context::WorkflowContext;
use crate::error::{ConfigError, NavigationError};
use crate::step::Step;
use crate::tips::{evaluate, ActiveTip};
use crate::validator::{validate, ValidationResult};
use crate::values::Values;
use crate::workflow::WorkflowConfig;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of a forward navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the step at `to`.
    Moved { from: usize, to: usize },
    /// The current step has errors; the index did not change.
    Blocked(ValidationResult),
    /// The current step is valid and it is the last one.
    Final,
}

/// Tracks the current step, collected values and validation errors.
#[derive(Debug)]
pub struct StepNavigator {
    config: Arc<WorkflowConfig>,
    index: usize,
    values: Values,
    errors: BTreeMap<String, String>,
    focused: Option<String>,
}

impl StepNavigator {
    /// Start at the first step, seeded with field defaults.
    ///
    /// The config is checked first, so a navigator always has a step.
    pub fn new(config: Arc<WorkflowConfig>) -> Result<Self, ConfigError> {
        config.check()?;
        let values = config.default_values();
        Ok(Self {
            config,
            index: 0,
            values,
            errors: BTreeMap::new(),
            focused: None,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn step_count(&self) -> usize {
        self.config.steps.len()
    }

    pub fn current_step(&self) -> &Step {
        &self.config.steps[self.index]
    }

    pub fn is_last_step(&self) -> bool {
        self.index + 1 >= self.step_count()
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Set a field's value, clearing any error recorded for it.
    pub fn set_value(&mut self, field_id: &str, value: Value) -> Result<(), NavigationError> {
        if self.config.find_field(field_id).is_none() {
            return Err(NavigationError::UnknownField(field_id.to_string()));
        }
        self.errors.remove(field_id);
        self.values.insert(field_id.to_string(), value);
        Ok(())
    }

    /// Remove a field's value.
    pub fn clear_value(&mut self, field_id: &str) -> Option<Value> {
        self.values.remove(field_id)
    }

    pub fn focus(&mut self, field_id: &str) -> Result<(), NavigationError> {
        if self.config.find_field(field_id).is_none() {
            return Err(NavigationError::UnknownField(field_id.to_string()));
        }
        self.focused = Some(field_id.to_string());
        Ok(())
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    /// Replace the error map with a validation result.
    pub fn publish(&mut self, result: &ValidationResult) {
        self.errors = result.errors.clone();
    }

    /// Validate the current step and move forward if it passes.
    pub fn advance(&mut self) -> Advance {
        let result = validate(self.current_step(), &self.values);
        self.publish(&result);

        if !result.valid {
            tracing::debug!(
                step = self.index,
                errors = result.errors.len(),
                "Advance blocked by validation"
            );
            return Advance::Blocked(result);
        }

        if self.is_last_step() {
            return Advance::Final;
        }

        let from = self.index;
        self.move_to(from + 1);
        Advance::Moved { from, to: self.index }
    }

    /// Move back one step. Values are kept.
    pub fn retreat(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.move_to(self.index - 1);
        true
    }

    /// Jump to a step by id.
    pub fn jump_to(&mut self, step_id: &str) -> Result<Advance, NavigationError> {
        let target = self
            .config
            .step_index(step_id)
            .ok_or_else(|| NavigationError::UnknownStep(step_id.to_string()))?;
        self.jump_to_index(target)
    }

    /// Jump to a step index.
    ///
    /// Backward jumps always succeed. A jump to the next step validates the
    /// current one first, exactly like [`advance`](Self::advance). Anything
    /// further ahead is rejected.
    pub fn jump_to_index(&mut self, target: usize) -> Result<Advance, NavigationError> {
        if target >= self.step_count() || target > self.index + 1 {
            return Err(NavigationError::StepLocked {
                target,
                current: self.index,
            });
        }

        if target == self.index + 1 {
            return Ok(self.advance());
        }

        let from = self.index;
        if target != from {
            self.move_to(target);
        }
        Ok(Advance::Moved { from, to: target })
    }

    /// Context for tip evaluation.
    pub fn context(&self) -> WorkflowContext {
        WorkflowContext {
            current_field: self.focused.clone(),
            current_step_id: Some(self.current_step().id.clone()),
            validation_errors: self.errors.clone(),
        }
    }

    /// Tips active for the latest values and context.
    pub fn tips(&self) -> Vec<ActiveTip> {
        evaluate(&self.config.tips, &self.values, &self.context())
    }

    fn move_to(&mut self, index: usize) {
        tracing::debug!(
            workflow = %self.config.id,
            from = self.index,
            to = index,
            "Step change"
        );
        self.index = index;
        self.errors.clear();
        self.focused = None;
    }
}
