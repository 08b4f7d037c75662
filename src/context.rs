//! Per-instance UI context used by tip evaluation.

use crate::values::Values;
use anyhow::{Context as _, Result};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Ephemeral UI state of a workflow instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContext {
    /// Field that currently has focus
    pub current_field: Option<String>,

    /// Step currently shown
    pub current_step_id: Option<String>,

    /// Errors from the latest validation run
    #[serde(default)]
    pub validation_errors: BTreeMap<String, String>,
}

impl WorkflowContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.current_field = Some(field.to_string());
        self
    }

    pub fn with_step(mut self, step: &str) -> Self {
        self.current_step_id = Some(step.to_string());
        self
    }

    pub fn with_error(mut self, field: &str, message: &str) -> Self {
        self.validation_errors
            .insert(field.to_string(), message.to_string());
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }

    /// Render a Handlebars template against values and this context.
    ///
    /// Values are addressed by field id (`{{ amount }}`), the context as
    /// `{{ context.currentStepId }}` unless a field is itself named `context`.
    pub fn render(&self, template: &str, values: &Values) -> Result<String> {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(false);
        hb.register_escape_fn(handlebars::no_escape);

        let mut data: Map<String, Value> = values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let context = serde_json::to_value(self).context("Failed to encode context")?;
        data.insert("$context".to_string(), context.clone());
        data.entry("context").or_insert(context);

        hb.render_template(template, &data)
            .context("Failed to render template")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_builders() {
        let ctx = WorkflowContext::new()
            .with_field("amount")
            .with_step("funding")
            .with_error("amount", "Amount is required");

        assert_eq!(ctx.current_field.as_deref(), Some("amount"));
        assert_eq!(ctx.current_step_id.as_deref(), Some("funding"));
        assert!(ctx.has_errors());
        assert!(!WorkflowContext::new().has_errors());
    }

    #[test]
    fn test_render_values() {
        let mut values = Values::new();
        values.insert("amount".to_string(), json!(250));
        values.insert("name".to_string(), json!("R&D fund"));

        let rendered = WorkflowContext::new()
            .render("Investing {{ amount }} into {{ name }}", &values)
            .unwrap();

        assert_eq!(rendered, "Investing 250 into R&D fund");
    }

    #[test]
    fn test_render_context() {
        let ctx = WorkflowContext::new().with_step("review");
        let rendered = ctx
            .render("You are on {{ context.currentStepId }}", &Values::new())
            .unwrap();

        assert_eq!(rendered, "You are on review");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let rendered = WorkflowContext::new()
            .render("Hello {{ nobody }}!", &Values::new())
            .unwrap();

        assert_eq!(rendered, "Hello !");
    }
}
