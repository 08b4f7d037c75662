//! Field definitions.

use crate::error::ConfigError;
use crate::values::{as_number, is_present};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of input a field collects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FieldKind {
    /// Multiple selection from `options`; the value is an array.
    SelectionList,
    /// Bounded numeric slider.
    NumericRangeSlider,
    /// One value from `options`.
    SingleChoice,
    FreeTextShort,
    FreeTextLong,
    /// One value from `options`, presented as cards.
    CardChoice,
    NumericInput,
    /// Rendered by the embedding application.
    ///
    /// `renderer` names a component registered by the host; the engine
    /// never looks inside it.
    CustomRender { renderer: String },
}

impl FieldKind {
    /// Whether values of this kind are numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::NumericRangeSlider | FieldKind::NumericInput)
    }

    /// Whether values of this kind are picked from `options`.
    pub fn uses_options(&self) -> bool {
        matches!(
            self,
            FieldKind::SelectionList | FieldKind::SingleChoice | FieldKind::CardChoice
        )
    }
}

/// A selectable option for choice fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OptionRepr")]
pub struct FieldOption {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// Options may be written as a bare value in YAML (`- high`).
#[derive(Deserialize)]
#[serde(untagged)]
enum OptionRepr {
    Full {
        value: Value,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    Bare(Value),
}

impl From<OptionRepr> for FieldOption {
    fn from(repr: OptionRepr) -> Self {
        match repr {
            OptionRepr::Full {
                value,
                label,
                description,
            } => Self {
                value,
                label,
                description,
            },
            OptionRepr::Bare(value) => Self {
                value,
                label: None,
                description: None,
            },
        }
    }
}

impl FieldOption {
    pub fn new<V: Into<Value>>(value: V, label: &str) -> Self {
        Self {
            value: value.into(),
            label: Some(label.to_string()),
            description: None,
        }
    }
}

/// A single input within a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field id, unique across the whole workflow
    pub id: String,

    #[serde(flatten)]
    pub kind: FieldKind,

    /// Label shown to the user
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Slider/input increment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,

    #[serde(default, alias = "defaultValue", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl Field {
    /// Start building a field of the given kind.
    pub fn new(id: &str, kind: FieldKind) -> FieldBuilder {
        FieldBuilder::new(id, kind)
    }

    pub fn numeric_input(id: &str) -> FieldBuilder {
        FieldBuilder::new(id, FieldKind::NumericInput)
    }

    pub fn slider(id: &str, min: f64, max: f64) -> FieldBuilder {
        FieldBuilder::new(id, FieldKind::NumericRangeSlider)
            .min(min)
            .max(max)
    }

    pub fn single_choice(id: &str) -> FieldBuilder {
        FieldBuilder::new(id, FieldKind::SingleChoice)
    }

    pub fn selection_list(id: &str) -> FieldBuilder {
        FieldBuilder::new(id, FieldKind::SelectionList)
    }

    pub fn card_choice(id: &str) -> FieldBuilder {
        FieldBuilder::new(id, FieldKind::CardChoice)
    }

    pub fn short_text(id: &str) -> FieldBuilder {
        FieldBuilder::new(id, FieldKind::FreeTextShort)
    }

    pub fn long_text(id: &str) -> FieldBuilder {
        FieldBuilder::new(id, FieldKind::FreeTextLong)
    }

    pub fn custom(id: &str, renderer: &str) -> FieldBuilder {
        FieldBuilder::new(
            id,
            FieldKind::CustomRender {
                renderer: renderer.to_string(),
            },
        )
    }

    /// Label for messages, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }

    /// Check the field's own invariants.
    pub fn check(&self) -> Result<(), ConfigError> {
        if !self.kind.is_numeric() {
            return Ok(());
        }

        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(ConfigError::InvalidRange {
                    field: self.id.clone(),
                    min,
                    max,
                });
            }
        }

        if let Some(default) = &self.default_value {
            let in_range = as_number(default)
                .map(|n| self.min.map_or(true, |min| n >= min) && self.max.map_or(true, |max| n <= max))
                .unwrap_or(false);
            if !in_range {
                return Err(ConfigError::DefaultOutOfRange {
                    field: self.id.clone(),
                    value: default.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Check a present value against `min`/`max` and `options`.
    ///
    /// Returns a user-facing message when the value violates a constraint.
    pub fn constraint_error(&self, value: &Value) -> Option<String> {
        if !is_present(Some(value)) {
            return None;
        }

        if self.kind.is_numeric() {
            let Some(n) = as_number(value) else {
                return Some(format!("{} must be a number", self.display_name()));
            };
            if let Some(min) = self.min {
                if n < min {
                    return Some(format!("{} must be at least {}", self.display_name(), min));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Some(format!("{} must be at most {}", self.display_name(), max));
                }
            }
            return None;
        }

        if self.kind.uses_options() && !self.options.is_empty() {
            let allowed = |v: &Value| self.options.iter().any(|o| &o.value == v);
            let ok = match value {
                Value::Array(items) => items.iter().all(allowed),
                other => allowed(other),
            };
            if !ok {
                return Some(format!("{} has an unsupported selection", self.display_name()));
            }
        }

        None
    }
}

/// Builder for creating fields.
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    pub fn new(id: &str, kind: FieldKind) -> Self {
        Self {
            field: Field {
                id: id.to_string(),
                kind,
                label: String::new(),
                required: false,
                min: None,
                max: None,
                step: None,
                options: Vec::new(),
                default_value: None,
                placeholder: None,
            },
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        self.field.label = label.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.field.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.field.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.field.max = Some(max);
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.field.step = Some(step);
        self
    }

    /// Add an option with a display label.
    pub fn option<V: Into<Value>>(mut self, value: V, label: &str) -> Self {
        self.field.options.push(FieldOption::new(value, label));
        self
    }

    pub fn default_value<V: Into<Value>>(mut self, value: V) -> Self {
        self.field.default_value = Some(value.into());
        self
    }

    pub fn placeholder(mut self, text: &str) -> Self {
        self.field.placeholder = Some(text.to_string());
        self
    }

    pub fn build(self) -> Field {
        self.field
    }
}

impl From<FieldBuilder> for Field {
    fn from(builder: FieldBuilder) -> Self {
        builder.build()
    }
}
