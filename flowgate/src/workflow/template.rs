//! Workflow template and step types with structural validation

use crate::error::WorkflowError;
use crate::workflow::RoleName;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// Errors that can occur when creating template-related types
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template name cannot be empty or whitespace only
    #[error("Template name cannot be empty or whitespace only")]
    EmptyTemplateName,
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Unique identifier for workflow templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(Ulid);

impl TemplateId {
    /// Create a new random template ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a TemplateId from a string representation
    pub fn parse(s: &str) -> Result<Self, String> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| format!("Invalid template ID '{}': {}", s, e))
    }
}

impl Default for TemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable name of a workflow template
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateName(String);

impl TemplateName {
    /// Create a new template name
    ///
    /// # Panics
    /// Panics if the name is empty or whitespace only. For non-panicking
    /// creation, use `try_new` instead.
    pub fn new(name: impl Into<String>) -> Self {
        Self::try_new(name).expect("Template name cannot be empty or whitespace only")
    }

    /// Create a new template name, returning an error for invalid input
    pub fn try_new(name: impl Into<String>) -> TemplateResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TemplateError::EmptyTemplateName);
        }
        Ok(Self(name))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TemplateName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TemplateName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TemplateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of action a step represents
///
/// Informational only: the transition semantics are identical for all
/// kinds, but audit displays and rule configuration use the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ActionKind {
    /// Check the entity for correctness
    Verify,
    /// Recommend the entity for approval
    Recommend,
    /// Approve the entity
    #[default]
    Approve,
    /// Sanction the entity (final financial/administrative blessing)
    Sanction,
    /// Review the entity without approval authority
    Review,
}

impl ActionKind {
    /// Get the string representation of the action kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Verify => "VERIFY",
            ActionKind::Recommend => "RECOMMEND",
            ActionKind::Approve => "APPROVE",
            ActionKind::Sanction => "SANCTION",
            ActionKind::Review => "REVIEW",
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VERIFY" => Ok(ActionKind::Verify),
            "RECOMMEND" => Ok(ActionKind::Recommend),
            "APPROVE" => Ok(ActionKind::Approve),
            "SANCTION" => Ok(ActionKind::Sanction),
            "REVIEW" => Ok(ActionKind::Review),
            other => Err(format!("Unknown action kind: '{}'", other)),
        }
    }
}

/// One stage in a template, bound to a required role and optional SLA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// 1-based position within the template, unique and contiguous
    pub step_order: u32,
    /// The role whose holders may act at this step
    pub role: RoleName,
    /// What kind of action this step represents
    pub action_kind: ActionKind,
    /// SLA in hours; when set, instances lingering past it are flagged overdue
    pub sla_hours: Option<u32>,
    /// Whether forward/reject at this step must carry non-empty remarks
    pub remarks_required: bool,
}

impl WorkflowStep {
    /// Create a step with the given order and role, defaulting the rest
    pub fn new(step_order: u32, role: impl Into<RoleName>, action_kind: ActionKind) -> Self {
        Self {
            step_order,
            role: role.into(),
            action_kind,
            sla_hours: None,
            remarks_required: false,
        }
    }

    /// Set the SLA hours for this step
    pub fn with_sla_hours(mut self, hours: u32) -> Self {
        self.sla_hours = Some(hours);
        self
    }

    /// Require remarks on forward/reject at this step
    pub fn with_remarks_required(mut self) -> Self {
        self.remarks_required = true;
        self
    }
}

/// Reusable ordered definition of approval steps for a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    /// Unique identifier
    pub id: TemplateId,
    /// Module tag grouping templates by entity kind (e.g. RA_BILL, TENDER)
    pub module: String,
    /// Template name
    pub name: TemplateName,
    /// Whether the template is eligible for new trigger matching
    pub is_active: bool,
    /// Ordered step sequence; orders are exactly 1..=N
    steps: Vec<WorkflowStep>,
}

impl WorkflowTemplate {
    /// Create a new template, validating the step sequence
    pub fn new(
        module: impl Into<String>,
        name: TemplateName,
        steps: Vec<WorkflowStep>,
    ) -> Result<Self, WorkflowError> {
        Self::validate_steps(&steps).map_err(|errors| WorkflowError::Validation {
            reason: errors.join("; "),
        })?;

        Ok(Self {
            id: TemplateId::new(),
            module: module.into(),
            name,
            is_active: true,
            steps,
        })
    }

    /// Validate the step sequence structure
    ///
    /// Orders must be exactly `1..=N` in positional order: no gaps, no
    /// duplicates, and every role non-empty.
    pub fn validate_steps(steps: &[WorkflowStep]) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if steps.is_empty() {
            errors.push("Template must have at least one step".to_string());
        }

        for (index, step) in steps.iter().enumerate() {
            let expected = index as u32 + 1;
            if step.step_order != expected {
                errors.push(format!(
                    "Step at position {} has order {} but must be {} (orders are contiguous from 1)",
                    index, step.step_order, expected
                ));
            }
            if step.role.as_str().trim().is_empty() {
                errors.push(format!("Step {} has an empty role", step.step_order));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The ordered step sequence
    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Whether the template has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by its 1-based order
    pub fn step(&self, step_order: u32) -> Option<&WorkflowStep> {
        if step_order == 0 {
            return None;
        }
        self.steps.get(step_order as usize - 1)
    }

    /// Append a step at position `N+1`
    ///
    /// Only appends are allowed on a live template: the incoming step's
    /// order must be exactly one past the current last step. This keeps
    /// in-flight instances (whose `current_step_order` points into the
    /// existing prefix) valid.
    pub fn append_step(&mut self, step: WorkflowStep) -> Result<(), WorkflowError> {
        let expected = self.len() + 1;
        if step.step_order != expected {
            return Err(WorkflowError::Validation {
                reason: format!(
                    "Step order {} is out of range: the next appendable order is {}",
                    step.step_order, expected
                ),
            });
        }
        if step.role.as_str().trim().is_empty() {
            return Err(WorkflowError::Validation {
                reason: format!("Step {} has an empty role", step.step_order),
            });
        }
        self.steps.push(step);
        Ok(())
    }

    /// Replace the entire step sequence
    ///
    /// Validates the new sequence but performs no instance checks; the
    /// store refuses to apply this to templates with active instances.
    pub fn replace_steps(&mut self, steps: Vec<WorkflowStep>) -> Result<(), WorkflowError> {
        Self::validate_steps(&steps).map_err(|errors| WorkflowError::Validation {
            reason: errors.join("; "),
        })?;
        self.steps = steps;
        Ok(())
    }

    /// Exclude this template from new trigger matching
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_helpers::*;
    use proptest::prelude::*;

    #[test]
    fn test_template_creation_validates_contiguity() {
        let template = create_three_step_template();
        assert_eq!(template.len(), 3);
        assert!(template.is_active);
        assert_eq!(template.step(1).unwrap().role.as_str(), "AE");
        assert_eq!(template.step(3).unwrap().action_kind, ActionKind::Sanction);
    }

    #[test]
    fn test_template_rejects_gap_in_orders() {
        let steps = vec![
            WorkflowStep::new(1, "AE", ActionKind::Verify),
            WorkflowStep::new(3, "EE", ActionKind::Approve),
        ];
        let result = WorkflowTemplate::new("RA_BILL", TemplateName::new("Bad"), steps);
        assert!(matches!(
            result,
            Err(WorkflowError::Validation { reason }) if reason.contains("contiguous")
        ));
    }

    #[test]
    fn test_template_rejects_duplicate_orders() {
        let steps = vec![
            WorkflowStep::new(1, "AE", ActionKind::Verify),
            WorkflowStep::new(1, "EE", ActionKind::Approve),
        ];
        let result = WorkflowTemplate::new("RA_BILL", TemplateName::new("Bad"), steps);
        assert!(result.is_err());
    }

    #[test]
    fn test_template_rejects_empty_steps() {
        let result = WorkflowTemplate::new("RA_BILL", TemplateName::new("Empty"), vec![]);
        assert!(matches!(
            result,
            Err(WorkflowError::Validation { reason }) if reason.contains("at least one step")
        ));
    }

    #[test]
    fn test_append_step_at_next_order() {
        let mut template = create_three_step_template();
        template
            .append_step(WorkflowStep::new(4, "CAO", ActionKind::Review))
            .unwrap();
        assert_eq!(template.len(), 4);
        assert_eq!(template.step(4).unwrap().role.as_str(), "CAO");
    }

    #[test]
    fn test_append_step_rejects_out_of_range_order() {
        let mut template = create_three_step_template();
        let result = template.append_step(WorkflowStep::new(2, "CAO", ActionKind::Review));
        assert!(result.is_err());
        assert_eq!(template.len(), 3);

        let result = template.append_step(WorkflowStep::new(6, "CAO", ActionKind::Review));
        assert!(result.is_err());
    }

    #[test]
    fn test_step_lookup_out_of_range() {
        let template = create_three_step_template();
        assert!(template.step(0).is_none());
        assert!(template.step(4).is_none());
    }

    #[test]
    fn test_action_kind_round_trip() {
        for kind in [
            ActionKind::Verify,
            ActionKind::Recommend,
            ActionKind::Approve,
            ActionKind::Sanction,
            ActionKind::Review,
        ] {
            let parsed: ActionKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("APPROVE-ISH".parse::<ActionKind>().is_err());
    }

    proptest! {
        /// After any valid create/append sequence, orders are exactly 1..=N.
        #[test]
        fn prop_step_orders_stay_contiguous(initial in 1u32..8, appended in 0u32..8) {
            let steps: Vec<WorkflowStep> = (1..=initial)
                .map(|i| WorkflowStep::new(i, format!("ROLE{}", i), ActionKind::Approve))
                .collect();
            let mut template =
                WorkflowTemplate::new("TENDER", TemplateName::new("Prop"), steps).unwrap();

            for _ in 0..appended {
                let next = template.len() + 1;
                template
                    .append_step(WorkflowStep::new(next, format!("ROLE{}", next), ActionKind::Review))
                    .unwrap();
            }

            let orders: Vec<u32> = template.steps().iter().map(|s| s.step_order).collect();
            let expected: Vec<u32> = (1..=initial + appended).collect();
            prop_assert_eq!(orders, expected);
        }

        /// Shuffled or gapped orders never validate.
        #[test]
        fn prop_gapped_orders_rejected(offset in 1u32..5, len in 2u32..6) {
            let steps: Vec<WorkflowStep> = (1..=len)
                .map(|i| {
                    let order = if i == len { i + offset } else { i };
                    WorkflowStep::new(order, format!("ROLE{}", i), ActionKind::Approve)
                })
                .collect();
            prop_assert!(WorkflowTemplate::validate_steps(&steps).is_err());
        }
    }
}
