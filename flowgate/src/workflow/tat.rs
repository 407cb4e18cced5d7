//! Turnaround-time (TAT) reporting over an instance's audit history
//!
//! Elapsed time at each step is derived entirely from the history log;
//! nothing here mutates the instance. A step revisited after a revert
//! accumulates the sum of all intervals spent at it.

use crate::workflow::{RoleName, WorkflowInstance, WorkflowInstanceId, WorkflowTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Elapsed time at a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTat {
    /// The step this measurement covers (1-based)
    pub step_order: u32,
    /// Role bound to the step in the template
    pub role: RoleName,
    /// Total wall-clock time spent at the step, across all visits
    pub elapsed: Duration,
    /// The step's SLA window in hours, if one is configured
    pub sla_hours: Option<u32>,
    /// Whether the elapsed time exceeds the SLA window
    ///
    /// Always `false` for steps with no SLA configured.
    pub overdue: bool,
}

/// Per-step and total turnaround for one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TatReport {
    /// The instance the report covers
    pub instance_id: WorkflowInstanceId,
    /// One entry per template step, in step order
    pub steps: Vec<StepTat>,
    /// Time from creation to terminal status, or to `now` while active
    pub total_elapsed: Duration,
}

fn to_std(d: chrono::Duration) -> Duration {
    d.to_std().unwrap_or_default()
}

/// The intervals the instance spent at each step, reconstructed from
/// the history log. Returns (step_order, start, end) triples.
fn step_intervals(
    instance: &WorkflowInstance,
    now: DateTime<Utc>,
) -> Vec<(u32, DateTime<Utc>, DateTime<Utc>)> {
    let mut intervals = Vec::new();
    // The instance always starts at step 1.
    let mut open: Option<(u32, DateTime<Utc>)> = Some((1, instance.created_at));

    for entry in instance.history.entries() {
        if let Some((step, started)) = open.take() {
            intervals.push((step, started, entry.timestamp));
        }
        if let Some(to) = entry.to_step {
            open = Some((to, entry.timestamp));
        }
    }

    if let Some((step, started)) = open {
        let end = instance.completed_at.unwrap_or(now);
        intervals.push((step, started, end));
    }
    intervals
}

/// Compute a full TAT report for an instance against its template
///
/// `now` closes the open interval of an in-progress instance; terminal
/// instances use their completion time instead.
pub fn tat_for_instance(
    instance: &WorkflowInstance,
    template: &WorkflowTemplate,
    now: DateTime<Utc>,
) -> TatReport {
    let intervals = step_intervals(instance, now);

    let steps = template
        .steps()
        .iter()
        .map(|step| {
            let elapsed: Duration = intervals
                .iter()
                .filter(|(order, _, _)| *order == step.step_order)
                .map(|(_, start, end)| to_std(*end - *start))
                .sum();
            let overdue = step
                .sla_hours
                .map(|h| elapsed > Duration::from_secs(u64::from(h) * 3600))
                .unwrap_or(false);
            StepTat {
                step_order: step.step_order,
                role: step.role.clone(),
                elapsed,
                sla_hours: step.sla_hours,
                overdue,
            }
        })
        .collect();

    let end = instance.completed_at.unwrap_or(now);
    TatReport {
        instance_id: instance.id,
        steps,
        total_elapsed: to_std(end - instance.created_at),
    }
}

/// Whether an active instance's current step has exceeded its SLA
///
/// Terminal instances and steps without an SLA are never overdue. The
/// clock starts at the most recent arrival at the current step.
pub fn is_current_step_overdue(
    instance: &WorkflowInstance,
    template: &WorkflowTemplate,
    now: DateTime<Utc>,
) -> bool {
    if !instance.is_active() {
        return false;
    }
    let Some(step) = template.step(instance.current_step_order) else {
        return false;
    };
    let Some(sla_hours) = step.sla_hours else {
        return false;
    };
    let waiting_since = instance.last_transition_at();
    to_std(now - waiting_since) > Duration::from_secs(u64::from(sla_hours) * 3600)
}
