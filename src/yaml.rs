//! YAML workflow parser.
//!
//! Only the data part of a workflow can be authored in YAML. Attach the
//! submit handler and hooks afterwards with
//! [`WorkflowConfig::with_submit`](crate::WorkflowConfig::with_submit).

use crate::WorkflowConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a workflow from YAML string.
///
/// # Example
///
/// ```rust
/// use guided_workflow::parse_yaml;
///
/// let yaml = r#"
/// id: fund-account
/// category: investing
/// steps:
///   - id: amount
///     fields:
///       - id: amount
///         type: numeric-input
///         label: Amount
///         required: true
///         min: 100
/// tips:
///   - id: amount-help
///     trigger: field-focus
///     target: amount
///     content: "The minimum deposit is 100"
/// "#;
///
/// let workflow = parse_yaml(yaml).unwrap();
/// assert_eq!(workflow.id, "fund-account");
/// assert_eq!(workflow.steps.len(), 1);
/// ```
pub fn parse_yaml(yaml: &str) -> Result<WorkflowConfig> {
    let workflow: WorkflowConfig =
        serde_yaml::from_str(yaml).context("Failed to parse workflow YAML")?;

    workflow.check().context("Invalid workflow definition")?;

    Ok(workflow)
}

/// Load and parse a workflow from a YAML file.
///
/// # Arguments
/// * `path` - Path to the YAML file
///
/// # Example
///
/// ```rust,no_run
/// use guided_workflow::yaml::load_file;
///
/// let workflow = load_file("workflows/report.yaml")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_file(path: impl AsRef<Path>) -> Result<WorkflowConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;

    parse_yaml(&content)
        .with_context(|| format!("Failed to parse workflow file: {}", path.display()))
}
