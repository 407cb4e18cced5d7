//! Append-only audit history for workflow instances

use crate::workflow::{RoleName, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The action a history entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionAction {
    /// Approved and advanced (or completed)
    Forward,
    /// Sent back to an earlier step for rework
    Revert,
    /// Terminated unfavorably
    Reject,
    /// Administratively withdrawn
    Cancel,
}

impl TransitionAction {
    /// Get the string representation of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionAction::Forward => "FORWARD",
            TransitionAction::Revert => "REVERT",
            TransitionAction::Reject => "REJECT",
            TransitionAction::Cancel => "CANCEL",
        }
    }
}

impl std::fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable record of who did what to an instance, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Monotonically increasing position within the instance's log;
    /// tie-breaks entries that carry identical timestamps
    pub sequence: u64,
    /// The user who acted
    pub acting_user: UserId,
    /// The role the user acted under; the step's nominal role even when
    /// the user only held it through delegation
    pub acting_role: RoleName,
    /// What happened
    pub action: TransitionAction,
    /// The step the instance was at when the action was taken
    pub from_step: u32,
    /// The step the instance moved to; `None` for rejections,
    /// cancellations, and the forward that completes the instance
    pub to_step: Option<u32>,
    /// Free-form remarks supplied by the actor
    pub remarks: String,
    /// When the action was taken
    pub timestamp: DateTime<Utc>,
}

/// Append-only ledger of an instance's transitions
///
/// Entries are never mutated or reordered after append; total order is
/// the timestamp plus the per-instance sequence counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    next_sequence: u64,
}

impl HistoryLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, assigning it the next sequence number
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        acting_user: UserId,
        acting_role: RoleName,
        action: TransitionAction,
        from_step: u32,
        to_step: Option<u32>,
        remarks: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> &HistoryEntry {
        let entry = HistoryEntry {
            sequence: self.next_sequence,
            acting_user,
            acting_role,
            action,
            from_step,
            to_step,
            remarks: remarks.into(),
            timestamp,
        };
        self.next_sequence += 1;
        self.entries.push(entry);
        self.entries.last().expect("entry was just pushed")
    }

    /// Entries in append order
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The most recent entry, if any
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
