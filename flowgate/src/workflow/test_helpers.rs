//! Shared helpers for workflow tests

use crate::workflow::{ActionKind, TemplateName, WorkflowStep, WorkflowTemplate};

/// A three-step estimate approval template:
/// 1. AE verifies (48h SLA)
/// 2. EE approves (24h SLA)
/// 3. CE sanctions (no SLA, remarks required)
pub fn create_three_step_template() -> WorkflowTemplate {
    WorkflowTemplate::new(
        "estimates",
        TemplateName::new("Estimate approval"),
        vec![
            WorkflowStep::new(1, "AE", ActionKind::Verify).with_sla_hours(48),
            WorkflowStep::new(2, "EE", ActionKind::Approve).with_sla_hours(24),
            WorkflowStep::new(3, "CE", ActionKind::Sanction).with_remarks_required(),
        ],
    )
    .expect("helper template is valid")
}
