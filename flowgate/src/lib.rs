//! Flowgate is a configurable multi-step approval workflow engine.
//!
//! Administrators define [`WorkflowTemplate`]s: ordered sequences of
//! role-bound approval steps for a module (estimates, bills, tenders).
//! [`TriggerRule`]s attach a template to each newly created entity, and
//! the resulting [`WorkflowInstance`] walks the steps one approval at a
//! time until it completes, is rejected, or is cancelled. Authorization
//! is delegation-aware, every transition lands in an append-only audit
//! history, and SLA/turnaround reports are derived from that history.
//!
//! # Example
//!
//! ```
//! use flowgate::{
//!     ActionKind, AuthorityResolver, DelegationLedger, EntityKey, RoleName,
//!     StaticRoleDirectory, TemplateName, UserId, WorkflowEngine, WorkflowStep,
//!     WorkflowStore,
//! };
//!
//! # fn main() -> flowgate::Result<()> {
//! let engine = WorkflowEngine::new(WorkflowStore::memory());
//! let template = engine.create_template(
//!     "estimates",
//!     TemplateName::new("Two-step approval"),
//!     vec![
//!         WorkflowStep::new(1, "AE", ActionKind::Verify),
//!         WorkflowStep::new(2, "EE", ActionKind::Approve),
//!     ],
//! )?;
//!
//! let mut directory = StaticRoleDirectory::new();
//! directory.assign(RoleName::new("AE"), UserId::new("alice"));
//! directory.assign(RoleName::new("EE"), UserId::new("bob"));
//! let ledger = DelegationLedger::new();
//! let resolver = AuthorityResolver::new(&directory, &ledger);
//!
//! let instance = engine.create_instance(&template.id, EntityKey::new("estimate", "E-1"))?;
//! engine.forward(&instance.id, &UserId::new("alice"), "figures verified", &resolver)?;
//! let receipt = engine.forward(&instance.id, &UserId::new("bob"), "approved", &resolver)?;
//! assert!(receipt.outcome.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod workflow;

pub use error::{FlowgateError, Result, WorkflowError};
pub use workflow::{
    is_current_step_overdue, matching_rules, resolve_template, tat_for_instance, ActionKind,
    AuthorityResolver,
    Delegation, DelegationId, DelegationLedger, EntityAttributes, EntityKey, HistoryEntry,
    HistoryLog, InstanceOutcome, InstanceStatus, OutcomeEvent, OverdueAlert, PendingItem,
    RoleDirectory, RoleName, RuleCondition, RuleId, StaticRoleDirectory, StepTat, TatReport,
    TemplateId, TemplateName, TransitionAction, TransitionReceipt, TriggerRule, UserId,
    WorkflowEngine, WorkflowInstance, WorkflowInstanceId, WorkflowStep, WorkflowStore,
    WorkflowTemplate,
};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
