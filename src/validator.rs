//! Field validation for a single step.

use crate::step::Step;
use crate::values::{is_present, Values};
use crate::workflow::WorkflowConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Outcome of validating a step against the collected values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,

    /// Field id to message
    pub errors: BTreeMap<String, String>,
}

impl ValidationResult {
    /// A passing result.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: BTreeMap::new(),
        }
    }

    /// Build a result from an error map; valid iff the map is empty.
    pub fn from_errors(errors: BTreeMap<String, String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Add an error for a field.
    pub fn with_error(mut self, field: &str, message: &str) -> Self {
        self.errors.insert(field.to_string(), message.to_string());
        self.valid = false;
        self
    }
}

/// A caller-supplied validation function.
#[derive(Clone)]
pub struct Validator(Arc<dyn Fn(&Values) -> ValidationResult + Send + Sync>);

impl Validator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Values) -> ValidationResult + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn run(&self, values: &Values) -> ValidationResult {
        (self.0)(values)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator(..)")
    }
}

/// Validate one step.
///
/// Required fields are checked first. Constraint checks (unless the step
/// skips them) and the step's custom validator may add errors, but never
/// replace an error already recorded for the same field.
pub fn validate(step: &Step, values: &Values) -> ValidationResult {
    let mut errors = BTreeMap::new();

    for field in &step.fields {
        if field.required && !is_present(values.get(&field.id)) {
            errors.insert(
                field.id.clone(),
                format!("{} is required", field.display_name()),
            );
        }
    }

    if step.enforce_constraints {
        for field in &step.fields {
            if errors.contains_key(&field.id) {
                continue;
            }
            if let Some(message) = values.get(&field.id).and_then(|v| field.constraint_error(v)) {
                errors.insert(field.id.clone(), message);
            }
        }
    }

    if let Some(custom) = &step.validator {
        merge(&mut errors, custom.run(values), &step.id);
    }

    ValidationResult::from_errors(errors)
}

/// Validate the final step plus the workflow-wide validator, if any.
pub fn validate_submission(config: &WorkflowConfig, values: &Values) -> ValidationResult {
    let Some(last) = config.steps.last() else {
        return ValidationResult::ok();
    };

    let mut result = validate(last, values);

    if let Some(cross) = config.cross_step_validator() {
        merge(&mut result.errors, cross.run(values), &config.id);
        result.valid = result.errors.is_empty();
    }

    result
}

fn merge(errors: &mut BTreeMap<String, String>, extra: ValidationResult, scope: &str) {
    if !extra.valid && extra.errors.is_empty() {
        // A bare "invalid" with no field detail is recorded against the scope.
        errors
            .entry(scope.to_string())
            .or_insert_with(|| "Please review this step".to_string());
    }
    for (field, message) in extra.errors {
        errors.entry(field).or_insert(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use serde_json::json;

    fn values(pairs: &[(&str, serde_json::Value)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_required_fields() {
        let step = Step::new("profile")
            .field(Field::short_text("name").label("Name").required())
            .field(Field::selection_list("goals").required())
            .field(Field::long_text("notes"))
            .build();

        let result = validate(
            &step,
            &values(&[("name", json!("  ")), ("goals", json!([]))]),
        );
        assert!(!result.valid);
        assert_eq!(result.errors.get("name").map(String::as_str), Some("Name is required"));
        assert_eq!(result.errors.get("goals").map(String::as_str), Some("goals is required"));
        assert!(!result.errors.contains_key("notes"));

        let result = validate(
            &step,
            &values(&[("name", json!("Ada")), ("goals", json!(["growth"]))]),
        );
        assert_eq!(result, ValidationResult::ok());
    }

    #[test]
    fn test_amount_minimum() {
        let step = Step::new("amount")
            .field(Field::numeric_input("amount").label("Amount").required().min(100.0))
            .build();

        let result = validate(&step, &values(&[("amount", json!(50))]));
        assert!(!result.valid);
        assert_eq!(result.errors["amount"], "Amount must be at least 100");

        let result = validate(&step, &values(&[("amount", json!(150))]));
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_skip_constraints() {
        let step = Step::new("amount")
            .field(Field::numeric_input("amount").required().min(100.0))
            .skip_constraints()
            .build();

        assert!(validate(&step, &values(&[("amount", json!(50))])).valid);
        assert!(!validate(&step, &Values::new()).valid);
    }

    #[test]
    fn test_custom_validator_merges_without_double_reporting() {
        let step = Step::new("contact")
            .field(Field::short_text("email").required())
            .field(Field::short_text("phone"))
            .validate_with(|values| {
                let mut result = ValidationResult::ok();
                if !values.contains_key("email") {
                    result = result.with_error("email", "custom email message");
                }
                if values.get("phone") == Some(&json!("000")) {
                    result = result.with_error("phone", "Phone number looks invalid");
                }
                result
            })
            .build();

        let result = validate(&step, &values(&[("phone", json!("000"))]));
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors["email"], "email is required");
        assert_eq!(result.errors["phone"], "Phone number looks invalid");
    }

    #[test]
    fn test_bare_invalid_is_recorded_against_step() {
        let step = Step::new("terms")
            .field(Field::single_choice("accept"))
            .validate_with(|_| ValidationResult {
                valid: false,
                errors: BTreeMap::new(),
            })
            .build();

        let result = validate(&step, &Values::new());
        assert!(!result.valid);
        assert!(result.errors.contains_key("terms"));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let step = Step::new("s")
            .field(Field::short_text("a").required())
            .field(Field::short_text("b").required())
            .build();
        let input = values(&[("a", json!(""))]);

        assert_eq!(validate(&step, &input), validate(&step, &input));
    }
}
