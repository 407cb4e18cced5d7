//! Unified error handling for the Flowgate library
//!
//! Two layers: `FlowgateError` is the library-wide error type covering
//! IO, serialization, and lookup failures; `WorkflowError` is the
//! transition-level taxonomy. Every `WorkflowError` is rejected before
//! any state change, so callers can always retry after fixing input.

use std::io;
use thiserror::Error;

/// The main error type for the Flowgate library
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowgateError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Template not found
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Workflow instance not found
    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(String),

    /// Trigger rule not found
    #[error("Trigger rule not found: {0}")]
    RuleNotFound(String),

    /// Delegation not found
    #[error("Delegation not found: {0}")]
    DelegationNotFound(String),

    /// A workflow-level rejection (see [`WorkflowError`])
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

/// Workflow-level rejections
///
/// All variants are rejected-before-mutation: when one of these is
/// returned, neither the instance nor its history has changed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkflowError {
    /// Malformed template, step, or rule input
    #[error("Validation failed: {reason}")]
    Validation {
        /// What was wrong with the input
        reason: String,
    },

    /// An in-progress instance already exists for the entity key
    #[error("Entity '{entity}' already has an active workflow instance")]
    DuplicateActiveInstance {
        /// The entity key that is already under workflow
        entity: String,
    },

    /// The instance is in a terminal state and accepts no transitions
    #[error("Instance '{instance}' is terminal ({status}) and cannot transition")]
    InstanceTerminal {
        /// The instance that was targeted
        instance: String,
        /// The terminal status it is in
        status: String,
    },

    /// Revert target is not an earlier step
    #[error("Cannot revert from step {from} to step {to}: target must be an earlier step")]
    InvalidStep {
        /// The step the instance is currently at
        from: u32,
        /// The requested target step
        to: u32,
    },

    /// The step requires remarks and none were given
    #[error("Step {step} requires remarks")]
    RemarksRequired {
        /// The step that demanded remarks
        step: u32,
    },

    /// The acting user does not hold (or delegate-hold) the step's role
    #[error("User '{user}' is not authorized to act as role '{role}'")]
    Unauthorized {
        /// The user who attempted the transition
        user: String,
        /// The role the current step requires
        role: String,
    },

    /// A user tried to delegate a role to themselves
    #[error("User '{user}' cannot delegate to themselves")]
    SelfDelegation {
        /// The offending user
        user: String,
    },

    /// The template has in-progress instances and cannot be reordered
    #[error("Template '{template}' has active instances and its steps cannot be reordered")]
    TemplateLocked {
        /// The locked template
        template: String,
    },

    /// The template no longer exists (or never did)
    #[error("Template '{template}' not found or no longer current")]
    StaleTemplate {
        /// The missing template
        template: String,
    },
}

impl WorkflowError {
    /// Stable error-kind identifier, suitable for structured
    /// `{kind, message}` responses at the API boundary
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation { .. } => "ValidationError",
            WorkflowError::DuplicateActiveInstance { .. } => "DuplicateActiveInstanceError",
            WorkflowError::InstanceTerminal { .. } => "InstanceTerminalError",
            WorkflowError::InvalidStep { .. } => "InvalidStepError",
            WorkflowError::RemarksRequired { .. } => "RemarksRequiredError",
            WorkflowError::Unauthorized { .. } => "UnauthorizedActionError",
            WorkflowError::SelfDelegation { .. } => "SelfDelegationError",
            WorkflowError::TemplateLocked { .. } => "TemplateLockedError",
            WorkflowError::StaleTemplate { .. } => "StaleTemplateError",
        }
    }
}

impl FlowgateError {
    /// Stable error-kind identifier for the API boundary
    pub fn kind(&self) -> &'static str {
        match self {
            FlowgateError::Io(_) => "IoError",
            FlowgateError::Json(_) => "SerializationError",
            FlowgateError::Storage(_) => "StorageError",
            FlowgateError::TemplateNotFound(_) => "TemplateNotFoundError",
            FlowgateError::InstanceNotFound(_) => "InstanceNotFoundError",
            FlowgateError::RuleNotFound(_) => "RuleNotFoundError",
            FlowgateError::DelegationNotFound(_) => "DelegationNotFoundError",
            FlowgateError::Workflow(e) => e.kind(),
            FlowgateError::Other(_) => "InternalError",
        }
    }
}

/// Result type alias for Flowgate operations
pub type Result<T> = std::result::Result<T, FlowgateError>;
