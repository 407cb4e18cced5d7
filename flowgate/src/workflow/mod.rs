//! Approval workflow system
//!
//! Templates define ordered, role-bound approval steps; trigger rules
//! attach templates to new entities; instances walk the steps under
//! delegation-aware authorization, with an append-only audit history
//! and SLA/turnaround reporting on top.

mod actor;
mod delegation;
mod engine;
mod history;
mod instance;
mod rule;
mod storage;
mod tat;
mod template;

#[cfg(test)]
pub mod test_helpers;

pub use actor::{ActorError, RoleName, UserId};
pub use delegation::{
    AuthorityResolver, Delegation, DelegationId, DelegationLedger, RoleDirectory,
    StaticRoleDirectory,
};
pub use engine::{
    InstanceOutcome, OutcomeEvent, OverdueAlert, PendingItem, TransitionReceipt, WorkflowEngine,
};
pub use history::{HistoryEntry, HistoryLog, TransitionAction};
pub use instance::{EntityKey, InstanceStatus, WorkflowInstance, WorkflowInstanceId};
pub use rule::{matching_rules, resolve_template, EntityAttributes, RuleCondition, RuleId, TriggerRule};
pub use storage::{
    FileSystemInstanceStorage, FileSystemTemplateStorage, InstanceStorageBackend,
    MemoryInstanceStorage, MemoryTemplateStorage, TemplateStorageBackend, WorkflowStore,
};
pub use tat::{is_current_step_overdue, tat_for_instance, StepTat, TatReport};
pub use template::{
    ActionKind, TemplateError, TemplateId, TemplateName, WorkflowStep, WorkflowTemplate,
};
