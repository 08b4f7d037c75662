//! Contextual tips selected by declarative rules.
//!
//! [`evaluate`] is a pure function of rules, values and context. Callers
//! re-run it after every context change; nothing is cached between calls.

use crate::context::WorkflowContext;
use crate::values::{is_present, Values};
use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Event class a tip rule reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TipTrigger {
    FieldFocus,
    FieldValue,
    ValidationState,
    StepChange,
}

/// Presentation severity of a tip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Tip,
    Info,
    Warning,
    Success,
}

type PredicateFn = dyn Fn(&Values, &WorkflowContext) -> bool + Send + Sync;
type ContentFn = dyn Fn(&Values, &WorkflowContext) -> String + Send + Sync;

/// Caller-supplied tip predicate.
#[derive(Clone)]
pub struct TipPredicate(Arc<PredicateFn>);

impl fmt::Debug for TipPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TipPredicate(..)")
    }
}

/// Extra condition a candidate rule must satisfy to become active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipCondition {
    FieldEquals { field: String, value: Value },
    FieldIn { field: String, values: Vec<Value> },
    FieldPresent { field: String },
    All(Vec<TipCondition>),
    Any(Vec<TipCondition>),
    Not(Box<TipCondition>),
    #[serde(skip)]
    Custom(TipPredicate),
}

impl TipCondition {
    /// Wrap a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Values, &WorkflowContext) -> bool + Send + Sync + 'static,
    {
        TipCondition::Custom(TipPredicate(Arc::new(f)))
    }

    pub fn holds(&self, values: &Values, context: &WorkflowContext) -> bool {
        match self {
            TipCondition::FieldEquals { field, value } => values.get(field) == Some(value),
            TipCondition::FieldIn { field, values: allowed } => values
                .get(field)
                .map_or(false, |v| allowed.contains(v)),
            TipCondition::FieldPresent { field } => is_present(values.get(field)),
            TipCondition::All(all) => all.iter().all(|c| c.holds(values, context)),
            TipCondition::Any(any) => any.iter().any(|c| c.holds(values, context)),
            TipCondition::Not(inner) => !inner.holds(values, context),
            TipCondition::Custom(predicate) => (predicate.0)(values, context),
        }
    }
}

/// Tip text: a literal (optionally a Handlebars template) or a closure.
#[derive(Clone)]
pub enum TipContent {
    Text(String),
    Dynamic(Arc<ContentFn>),
}

impl TipContent {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&Values, &WorkflowContext) -> String + Send + Sync + 'static,
    {
        TipContent::Dynamic(Arc::new(f))
    }

    /// Produce the text for the current values and context.
    pub fn resolve(&self, values: &Values, context: &WorkflowContext) -> String {
        match self {
            TipContent::Text(text) if text.contains("{{") && text.contains("}}") => {
                match context.render(text, values) {
                    Ok(rendered) => rendered,
                    Err(err) => {
                        tracing::debug!(error = %err, "Tip template failed to render");
                        text.clone()
                    }
                }
            }
            TipContent::Text(text) => text.clone(),
            TipContent::Dynamic(f) => f(values, context),
        }
    }
}

impl fmt::Debug for TipContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TipContent::Text(text) => f.debug_tuple("Text").field(text).finish(),
            TipContent::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for TipContent {
    fn from(text: &str) -> Self {
        TipContent::Text(text.to_string())
    }
}

impl From<String> for TipContent {
    fn from(text: String) -> Self {
        TipContent::Text(text)
    }
}

impl Serialize for TipContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TipContent::Text(text) => serializer.serialize_str(text),
            TipContent::Dynamic(_) => Err(S::Error::custom("dynamic tip content cannot be serialized")),
        }
    }
}

impl<'de> Deserialize<'de> for TipContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(TipContent::Text)
    }
}

/// A declarative guidance rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TipRule {
    pub id: String,

    pub trigger: TipTrigger,

    /// Field id (focus/value triggers) or step id (step-change trigger).
    ///
    /// Without a target, focus and step-change rules match every event.
    #[serde(
        default,
        alias = "field_id",
        alias = "fieldId",
        alias = "step_id",
        alias = "stepId"
    )]
    pub target: Option<String>,

    /// Written as a single-key map (`field_equals: {..}`) in YAML and JSON.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub condition: Option<TipCondition>,

    pub content: TipContent,

    #[serde(default)]
    pub severity: Severity,
}

impl TipRule {
    /// Create a rule with literal content.
    pub fn new(id: &str, trigger: TipTrigger, content: impl Into<TipContent>) -> Self {
        Self {
            id: id.to_string(),
            trigger,
            target: None,
            condition: None,
            content: content.into(),
            severity: Severity::default(),
        }
    }

    pub fn on_focus(id: &str, content: impl Into<TipContent>) -> Self {
        Self::new(id, TipTrigger::FieldFocus, content)
    }

    pub fn on_value(id: &str, content: impl Into<TipContent>) -> Self {
        Self::new(id, TipTrigger::FieldValue, content)
    }

    pub fn on_errors(id: &str, content: impl Into<TipContent>) -> Self {
        Self::new(id, TipTrigger::ValidationState, content)
    }

    pub fn on_step(id: &str, content: impl Into<TipContent>) -> Self {
        Self::new(id, TipTrigger::StepChange, content)
    }

    pub fn target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn when(mut self, condition: TipCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Shorthand for a closure condition.
    pub fn when_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Values, &WorkflowContext) -> bool + Send + Sync + 'static,
    {
        self.when(TipCondition::custom(f))
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Whether the trigger condition holds, ignoring `condition`.
    pub fn is_candidate(&self, values: &Values, context: &WorkflowContext) -> bool {
        let target = self.target.as_deref();
        match self.trigger {
            TipTrigger::FieldFocus => match context.current_field.as_deref() {
                Some(focused) => target.map_or(true, |t| t == focused),
                None => false,
            },
            TipTrigger::FieldValue => target.map_or(true, |t| is_present(values.get(t))),
            TipTrigger::ValidationState => context.has_errors(),
            TipTrigger::StepChange => match context.current_step_id.as_deref() {
                Some(step) => target.map_or(true, |t| t == step),
                None => false,
            },
        }
    }

    /// Whether the rule is active for these values and context.
    pub fn is_active(&self, values: &Values, context: &WorkflowContext) -> bool {
        self.is_candidate(values, context)
            && self
                .condition
                .as_ref()
                .map_or(true, |c| c.holds(values, context))
    }
}

/// A tip selected for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTip {
    pub id: String,
    pub severity: Severity,
    pub content: String,
}

/// Select the active tips, in rule declaration order.
pub fn evaluate(rules: &[TipRule], values: &Values, context: &WorkflowContext) -> Vec<ActiveTip> {
    let tips: Vec<ActiveTip> = rules
        .iter()
        .filter(|rule| rule.is_active(values, context))
        .map(|rule| ActiveTip {
            id: rule.id.clone(),
            severity: rule.severity,
            content: rule.content.resolve(values, context),
        })
        .collect();

    tracing::debug!(
        rules = rules.len(),
        active = tips.len(),
        field = ?context.current_field,
        step = ?context.current_step_id,
        "Evaluated tips"
    );

    tips
}
