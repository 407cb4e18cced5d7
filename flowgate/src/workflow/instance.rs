//! Workflow instance state: one in-flight (or finished) traversal of a
//! template's step sequence for a single business entity

use crate::workflow::HistoryLog;
use crate::workflow::TemplateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct WorkflowInstanceId(Ulid);

impl WorkflowInstanceId {
    /// Create a new unique instance ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse an instance ID from its string representation
    pub fn parse(s: &str) -> crate::Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| crate::FlowgateError::Other(format!("Invalid instance ID '{s}': {e}")))
    }
}

impl Default for WorkflowInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the business entity an instance governs
///
/// The pair is the unit of the one-active-instance rule: at most one
/// non-terminal instance may exist per entity key at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Kind of entity, e.g. "estimate" or "bill"
    pub entity_type: String,
    /// Identifier of the entity within its kind
    pub entity_id: String,
}

impl EntityKey {
    /// Create an entity key
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Lifecycle status of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// Awaiting action at some step
    InProgress,
    /// Every step approved; terminal
    Completed,
    /// Rejected at some step; terminal
    Rejected,
    /// Administratively withdrawn; terminal
    Cancelled,
}

impl InstanceStatus {
    /// Whether the status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::InProgress)
    }

    /// Get the string representation of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::InProgress => "IN_PROGRESS",
            InstanceStatus::Completed => "COMPLETED",
            InstanceStatus::Rejected => "REJECTED",
            InstanceStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single run of a workflow template against one entity
///
/// The current step pointer and status only change through the
/// engine's transition operations; every change is mirrored by an
/// appended [`HistoryLog`] entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique identifier for this instance
    pub id: WorkflowInstanceId,
    /// The template this instance traverses
    ///
    /// Pinned at creation; later template edits never affect this
    /// instance.
    pub template_id: TemplateId,
    /// The entity under approval
    pub entity_key: EntityKey,
    /// Module the instance belongs to, copied from the template
    pub module: String,
    /// The step currently awaiting action (1-based)
    pub current_step_order: u32,
    /// Lifecycle status
    pub status: InstanceStatus,
    /// When the instance was started
    pub created_at: DateTime<Utc>,
    /// When the instance reached a terminal status, if it has
    pub completed_at: Option<DateTime<Utc>>,
    /// Append-only audit trail
    pub history: HistoryLog,
}

impl WorkflowInstance {
    /// Start a new instance at step 1
    pub fn new(
        template_id: TemplateId,
        entity_key: EntityKey,
        module: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WorkflowInstanceId::new(),
            template_id,
            entity_key,
            module: module.into(),
            current_step_order: 1,
            status: InstanceStatus::InProgress,
            created_at,
            completed_at: None,
            history: HistoryLog::new(),
        }
    }

    /// Whether the instance still accepts transitions
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Move the step pointer; the caller has already validated the target
    pub fn advance_to(&mut self, step_order: u32) {
        self.current_step_order = step_order;
    }

    /// Mark the instance completed
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = InstanceStatus::Completed;
        self.completed_at = Some(at);
    }

    /// Mark the instance rejected
    pub fn reject(&mut self, at: DateTime<Utc>) {
        self.status = InstanceStatus::Rejected;
        self.completed_at = Some(at);
    }

    /// Mark the instance cancelled
    pub fn cancel(&mut self, at: DateTime<Utc>) {
        self.status = InstanceStatus::Cancelled;
        self.completed_at = Some(at);
    }

    /// When the most recent transition happened; creation time if none
    pub fn last_transition_at(&self) -> DateTime<Utc> {
        self.history
            .last()
            .map(|e| e.timestamp)
            .unwrap_or(self.created_at)
    }
}
