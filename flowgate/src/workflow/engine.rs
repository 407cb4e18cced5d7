//! Workflow engine: orchestrates template administration, trigger
//! matching, and instance transitions over a [`WorkflowStore`]
//!
//! Transitions are validate-then-mutate: every check runs against the
//! loaded state under the instance's lock, and the instance (with its
//! appended history entry) is written back as one document only after
//! all checks pass.

use crate::error::{FlowgateError, WorkflowError};
use crate::workflow::{
    is_current_step_overdue, matching_rules, tat_for_instance, ActionKind, AuthorityResolver,
    EntityAttributes, EntityKey, HistoryEntry, InstanceStatus, RoleName, RuleCondition, RuleId,
    TatReport, TemplateId, TemplateName, TransitionAction, TriggerRule, UserId,
    WorkflowInstance, WorkflowInstanceId, WorkflowStep, WorkflowStore, WorkflowTemplate,
};
use crate::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Terminal outcome of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOutcome {
    /// Every step approved
    Completed,
    /// Rejected at some step
    Rejected,
    /// Administratively withdrawn
    Cancelled,
}

/// Emitted when a transition drives an instance to a terminal status
///
/// The caller uses this to flip the underlying entity's state (e.g.
/// mark a bill approved) exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeEvent {
    /// The instance that finished
    pub instance_id: WorkflowInstanceId,
    /// The entity it governed
    pub entity_key: EntityKey,
    /// How it finished
    pub outcome: InstanceOutcome,
}

/// Result of a successful transition
#[derive(Debug, Clone)]
pub struct TransitionReceipt {
    /// The instance after the transition, including the new history entry
    pub instance: WorkflowInstance,
    /// Present when the transition was terminal
    pub outcome: Option<OutcomeEvent>,
}

/// One item in a user's pending-action worklist
#[derive(Debug, Clone)]
pub struct PendingItem {
    /// The waiting instance
    pub instance_id: WorkflowInstanceId,
    /// The entity under approval
    pub entity_key: EntityKey,
    /// Module of the instance
    pub module: String,
    /// The step awaiting action
    pub step_order: u32,
    /// Role the step requires
    pub role: RoleName,
    /// The kind of action the step calls for
    pub action_kind: ActionKind,
    /// When the instance arrived at this step
    pub waiting_since: DateTime<Utc>,
    /// Whether the step has exceeded its SLA window
    pub overdue: bool,
}

/// One SLA breach found by [`WorkflowEngine::sweep_overdue`]
#[derive(Debug, Clone)]
pub struct OverdueAlert {
    /// The breaching instance
    pub instance_id: WorkflowInstanceId,
    /// The entity under approval
    pub entity_key: EntityKey,
    /// The step that breached
    pub step_order: u32,
    /// Role the step requires
    pub role: RoleName,
    /// The step's SLA window in hours
    pub sla_hours: u32,
    /// When the instance arrived at the step
    pub waiting_since: DateTime<Utc>,
}

/// The approval workflow engine
///
/// Cheap to clone; clones share the store and the per-instance lock
/// table, so concurrent transitions against the same instance serialize
/// correctly across clones.
#[derive(Clone)]
pub struct WorkflowEngine {
    store: WorkflowStore,
    locks: Arc<DashMap<WorkflowInstanceId, Arc<Mutex<()>>>>,
    entity_guard: Arc<Mutex<()>>,
}

impl WorkflowEngine {
    /// Create an engine over the given store
    pub fn new(store: WorkflowStore) -> Self {
        Self {
            store,
            locks: Arc::new(DashMap::new()),
            entity_guard: Arc::new(Mutex::new(())),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    fn instance_lock(&self, id: WorkflowInstanceId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // Template administration

    /// Create and store a new template
    pub fn create_template(
        &self,
        module: impl Into<String>,
        name: TemplateName,
        steps: Vec<WorkflowStep>,
    ) -> Result<WorkflowTemplate> {
        let template = WorkflowTemplate::new(module, name, steps)?;
        self.store.store_template(template.clone())?;
        info!(template_id = %template.id, module = %template.module, "Created workflow template");
        Ok(template)
    }

    /// Append a step to an existing template
    ///
    /// Appends are always safe for in-flight instances, so no lock
    /// check applies. A missing template means the caller's view is
    /// stale.
    pub fn add_step(&self, template_id: &TemplateId, step: WorkflowStep) -> Result<WorkflowTemplate> {
        let mut template =
            self.store
                .get_template(template_id)?
                .ok_or_else(|| WorkflowError::StaleTemplate {
                    template: template_id.to_string(),
                })?;
        template.append_step(step)?;
        self.store.store_template(template.clone())?;
        debug!(template_id = %template.id, steps = template.len(), "Appended template step");
        Ok(template)
    }

    /// Replace a template's step sequence
    ///
    /// Refused while any instance of the template is in progress, since
    /// a reorder would silently change what in-flight step pointers
    /// mean.
    pub fn reorder_steps(
        &self,
        template_id: &TemplateId,
        steps: Vec<WorkflowStep>,
    ) -> Result<WorkflowTemplate> {
        let mut template =
            self.store
                .get_template(template_id)?
                .ok_or_else(|| WorkflowError::StaleTemplate {
                    template: template_id.to_string(),
                })?;

        let has_active = self
            .store
            .list_instances()?
            .iter()
            .any(|i| i.template_id == *template_id && i.is_active());
        if has_active {
            return Err(WorkflowError::TemplateLocked {
                template: template_id.to_string(),
            }
            .into());
        }

        template.replace_steps(steps)?;
        self.store.store_template(template.clone())?;
        info!(template_id = %template.id, "Replaced template step sequence");
        Ok(template)
    }

    /// Deactivate a template so trigger matching skips it
    ///
    /// In-flight instances keep running to completion.
    pub fn deactivate_template(&self, template_id: &TemplateId) -> Result<WorkflowTemplate> {
        let mut template =
            self.store
                .get_template(template_id)?
                .ok_or_else(|| FlowgateError::TemplateNotFound(template_id.to_string()))?;
        template.deactivate();
        self.store.store_template(template.clone())?;
        info!(template_id = %template.id, "Deactivated workflow template");
        Ok(template)
    }

    // Trigger rules

    /// Add a trigger rule
    ///
    /// The referenced template must exist.
    pub fn add_rule(
        &self,
        module: impl Into<String>,
        condition: RuleCondition,
        template_id: TemplateId,
        priority: i32,
    ) -> Result<TriggerRule> {
        if self.store.get_template(&template_id)?.is_none() {
            return Err(FlowgateError::TemplateNotFound(template_id.to_string()));
        }
        let rule = TriggerRule::new(module, condition, template_id, priority);
        self.store.store_rule(rule.clone())?;
        info!(rule_id = %rule.id, module = %rule.module, priority = rule.priority, "Added trigger rule");
        Ok(rule)
    }

    /// Remove a trigger rule
    pub fn remove_rule(&self, rule_id: &RuleId) -> Result<()> {
        self.store.remove_rule(rule_id)?;
        info!(rule_id = %rule_id, "Removed trigger rule");
        Ok(())
    }

    // Instance lifecycle

    /// Start an instance of an explicit template for an entity
    ///
    /// At most one non-terminal instance may exist per entity key; a
    /// second attempt fails with `DuplicateActiveInstanceError`.
    pub fn create_instance(
        &self,
        template_id: &TemplateId,
        entity_key: EntityKey,
    ) -> Result<WorkflowInstance> {
        let template =
            self.store
                .get_template(template_id)?
                .ok_or_else(|| WorkflowError::StaleTemplate {
                    template: template_id.to_string(),
                })?;

        // Serializes the duplicate check against concurrent creators.
        let _guard = self
            .entity_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.store.active_instance_for(&entity_key)?.is_some() {
            return Err(WorkflowError::DuplicateActiveInstance {
                entity: entity_key.to_string(),
            }
            .into());
        }

        let instance =
            WorkflowInstance::new(template.id, entity_key, template.module.clone(), Utc::now());
        self.store.store_instance(instance.clone())?;
        info!(
            instance_id = %instance.id,
            template_id = %template.id,
            entity = %instance.entity_key,
            "Started workflow instance"
        );
        Ok(instance)
    }

    /// Evaluate trigger rules for a new entity and start an instance if
    /// one matches
    ///
    /// `Ok(None)` means no rule matched and the entity proceeds without
    /// a workflow.
    pub fn start_for_entity(
        &self,
        module: &str,
        entity_key: EntityKey,
        attributes: &EntityAttributes,
    ) -> Result<Option<WorkflowInstance>> {
        let rules = self.store.list_rules()?;
        for rule in matching_rules(&rules, module, attributes) {
            // Deactivated templates are excluded from new matching; the
            // next matching rule gets a chance instead.
            match self.store.get_template(&rule.template_id)? {
                Some(template) if template.is_active => {
                    return self.create_instance(&template.id, entity_key).map(Some);
                }
                _ => {
                    debug!(
                        rule_id = %rule.id,
                        template_id = %rule.template_id,
                        "Skipping rule bound to missing or deactivated template"
                    );
                }
            }
        }
        debug!(module, entity = %entity_key, "No trigger rule matched");
        Ok(None)
    }

    /// Approve the current step and advance (or complete) the instance
    pub fn forward(
        &self,
        instance_id: &WorkflowInstanceId,
        acting_user: &UserId,
        remarks: &str,
        resolver: &AuthorityResolver<'_>,
    ) -> Result<TransitionReceipt> {
        let lock = self.instance_lock(*instance_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();

        let (mut instance, template) = self.load_active(instance_id)?;
        let step = self.current_step(&instance, &template)?;

        self.check_authority(acting_user, &step.role, &instance.module, now, resolver)?;
        if step.remarks_required && remarks.trim().is_empty() {
            return Err(WorkflowError::RemarksRequired {
                step: step.step_order,
            }
            .into());
        }

        let role = step.role.clone();
        let from = instance.current_step_order;
        let outcome = if from < template.len() {
            let to = from + 1;
            instance.history.append(
                acting_user.clone(),
                role,
                TransitionAction::Forward,
                from,
                Some(to),
                remarks,
                now,
            );
            instance.advance_to(to);
            debug!(instance_id = %instance.id, from, to, "Advanced workflow instance");
            None
        } else {
            instance.history.append(
                acting_user.clone(),
                role,
                TransitionAction::Forward,
                from,
                None,
                remarks,
                now,
            );
            instance.complete(now);
            info!(instance_id = %instance.id, entity = %instance.entity_key, "Workflow instance completed");
            Some(OutcomeEvent {
                instance_id: instance.id,
                entity_key: instance.entity_key.clone(),
                outcome: InstanceOutcome::Completed,
            })
        };

        self.store.store_instance(instance.clone())?;
        Ok(TransitionReceipt { instance, outcome })
    }

    /// Send the instance back to an earlier step for rework
    ///
    /// The target must be strictly earlier than the current step, and
    /// only someone empowered at the current step may send it back.
    pub fn revert(
        &self,
        instance_id: &WorkflowInstanceId,
        acting_user: &UserId,
        target_step: u32,
        remarks: &str,
        resolver: &AuthorityResolver<'_>,
    ) -> Result<TransitionReceipt> {
        let lock = self.instance_lock(*instance_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();

        let (mut instance, template) = self.load_active(instance_id)?;
        let step = self.current_step(&instance, &template)?;

        self.check_authority(acting_user, &step.role, &instance.module, now, resolver)?;
        let from = instance.current_step_order;
        if target_step == 0 || target_step >= from {
            return Err(WorkflowError::InvalidStep {
                from,
                to: target_step,
            }
            .into());
        }

        instance.history.append(
            acting_user.clone(),
            step.role.clone(),
            TransitionAction::Revert,
            from,
            Some(target_step),
            remarks,
            now,
        );
        instance.advance_to(target_step);
        self.store.store_instance(instance.clone())?;
        debug!(instance_id = %instance.id, from, to = target_step, "Reverted workflow instance");
        Ok(TransitionReceipt {
            instance,
            outcome: None,
        })
    }

    /// Reject the instance at the current step (terminal)
    ///
    /// Rejections always require remarks.
    pub fn reject(
        &self,
        instance_id: &WorkflowInstanceId,
        acting_user: &UserId,
        remarks: &str,
        resolver: &AuthorityResolver<'_>,
    ) -> Result<TransitionReceipt> {
        let lock = self.instance_lock(*instance_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();

        let (mut instance, template) = self.load_active(instance_id)?;
        let step = self.current_step(&instance, &template)?;

        if remarks.trim().is_empty() {
            return Err(WorkflowError::RemarksRequired {
                step: step.step_order,
            }
            .into());
        }
        self.check_authority(acting_user, &step.role, &instance.module, now, resolver)?;

        let from = instance.current_step_order;
        instance.history.append(
            acting_user.clone(),
            step.role.clone(),
            TransitionAction::Reject,
            from,
            None,
            remarks,
            now,
        );
        instance.reject(now);
        self.store.store_instance(instance.clone())?;
        info!(instance_id = %instance.id, entity = %instance.entity_key, step = from, "Workflow instance rejected");
        Ok(TransitionReceipt {
            outcome: Some(OutcomeEvent {
                instance_id: instance.id,
                entity_key: instance.entity_key.clone(),
                outcome: InstanceOutcome::Rejected,
            }),
            instance,
        })
    }

    /// Administratively cancel the instance (terminal)
    ///
    /// Cancellation is an operator action, not a step approval, so no
    /// role check applies; it is still recorded in the history.
    pub fn cancel(
        &self,
        instance_id: &WorkflowInstanceId,
        acting_user: &UserId,
        remarks: &str,
    ) -> Result<TransitionReceipt> {
        let lock = self.instance_lock(*instance_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();

        let (mut instance, template) = self.load_active(instance_id)?;
        let step = self.current_step(&instance, &template)?;

        let from = instance.current_step_order;
        instance.history.append(
            acting_user.clone(),
            step.role.clone(),
            TransitionAction::Cancel,
            from,
            None,
            remarks,
            now,
        );
        instance.cancel(now);
        self.store.store_instance(instance.clone())?;
        info!(instance_id = %instance.id, entity = %instance.entity_key, "Workflow instance cancelled");
        Ok(TransitionReceipt {
            outcome: Some(OutcomeEvent {
                instance_id: instance.id,
                entity_key: instance.entity_key.clone(),
                outcome: InstanceOutcome::Cancelled,
            }),
            instance,
        })
    }

    // Queries

    /// Everything currently waiting on `user`, across all instances
    pub fn pending_for_user(
        &self,
        user: &UserId,
        resolver: &AuthorityResolver<'_>,
    ) -> Result<Vec<PendingItem>> {
        let now = Utc::now();
        let mut items = Vec::new();
        for instance in self.store.list_instances()? {
            if !instance.is_active() {
                continue;
            }
            let Some(template) = self.store.get_template(&instance.template_id)? else {
                warn!(instance_id = %instance.id, "Instance references missing template");
                continue;
            };
            let Some(step) = template.step(instance.current_step_order) else {
                continue;
            };
            if !resolver.is_authorized(user, &step.role, Some(&instance.module), now) {
                continue;
            }
            items.push(PendingItem {
                instance_id: instance.id,
                entity_key: instance.entity_key.clone(),
                module: instance.module.clone(),
                step_order: step.step_order,
                role: step.role.clone(),
                action_kind: step.action_kind,
                waiting_since: instance.last_transition_at(),
                overdue: is_current_step_overdue(&instance, &template, now),
            });
        }
        items.sort_by_key(|i| i.waiting_since);
        Ok(items)
    }

    /// Find every in-progress instance whose current step has breached
    /// its SLA
    ///
    /// Read-only: breaches are reported, never acted on.
    pub fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<Vec<OverdueAlert>> {
        let mut alerts = Vec::new();
        for instance in self.store.list_instances()? {
            if !instance.is_active() {
                continue;
            }
            let Some(template) = self.store.get_template(&instance.template_id)? else {
                continue;
            };
            if !is_current_step_overdue(&instance, &template, now) {
                continue;
            }
            let Some(step) = template.step(instance.current_step_order) else {
                continue;
            };
            let Some(sla_hours) = step.sla_hours else {
                continue;
            };
            warn!(
                instance_id = %instance.id,
                entity = %instance.entity_key,
                step = step.step_order,
                sla_hours,
                "Workflow step SLA breached"
            );
            alerts.push(OverdueAlert {
                instance_id: instance.id,
                entity_key: instance.entity_key.clone(),
                step_order: step.step_order,
                role: step.role.clone(),
                sla_hours,
                waiting_since: instance.last_transition_at(),
            });
        }
        Ok(alerts)
    }

    /// Turnaround-time report for an instance
    pub fn tat(&self, instance_id: &WorkflowInstanceId) -> Result<TatReport> {
        let instance = self
            .store
            .get_instance(instance_id)?
            .ok_or_else(|| FlowgateError::InstanceNotFound(instance_id.to_string()))?;
        let template = self
            .store
            .get_template(&instance.template_id)?
            .ok_or_else(|| FlowgateError::TemplateNotFound(instance.template_id.to_string()))?;
        Ok(tat_for_instance(&instance, &template, Utc::now()))
    }

    /// An instance's audit history, in order
    pub fn history(&self, instance_id: &WorkflowInstanceId) -> Result<Vec<HistoryEntry>> {
        let instance = self
            .store
            .get_instance(instance_id)?
            .ok_or_else(|| FlowgateError::InstanceNotFound(instance_id.to_string()))?;
        Ok(instance.history.entries().to_vec())
    }

    // Shared transition plumbing

    fn load_active(
        &self,
        instance_id: &WorkflowInstanceId,
    ) -> Result<(WorkflowInstance, WorkflowTemplate)> {
        let instance = self
            .store
            .get_instance(instance_id)?
            .ok_or_else(|| FlowgateError::InstanceNotFound(instance_id.to_string()))?;
        if !instance.is_active() {
            return Err(WorkflowError::InstanceTerminal {
                instance: instance.id.to_string(),
                status: instance.status.as_str().to_string(),
            }
            .into());
        }
        let template = self
            .store
            .get_template(&instance.template_id)?
            .ok_or_else(|| WorkflowError::StaleTemplate {
                template: instance.template_id.to_string(),
            })?;
        Ok((instance, template))
    }

    fn current_step<'t>(
        &self,
        instance: &WorkflowInstance,
        template: &'t WorkflowTemplate,
    ) -> Result<&'t WorkflowStep> {
        template
            .step(instance.current_step_order)
            .ok_or_else(|| {
                WorkflowError::StaleTemplate {
                    template: instance.template_id.to_string(),
                }
                .into()
            })
    }

    fn check_authority(
        &self,
        user: &UserId,
        role: &RoleName,
        module: &str,
        at: DateTime<Utc>,
        resolver: &AuthorityResolver<'_>,
    ) -> Result<()> {
        if resolver.is_authorized(user, role, Some(module), at) {
            Ok(())
        } else {
            Err(WorkflowError::Unauthorized {
                user: user.to_string(),
                role: role.to_string(),
            }
            .into())
        }
    }
}

/// `InstanceStatus` mapped to its outcome, for terminal instances
impl TryFrom<InstanceStatus> for InstanceOutcome {
    type Error = ();

    fn try_from(status: InstanceStatus) -> std::result::Result<Self, Self::Error> {
        match status {
            InstanceStatus::Completed => Ok(InstanceOutcome::Completed),
            InstanceStatus::Rejected => Ok(InstanceOutcome::Rejected),
            InstanceStatus::Cancelled => Ok(InstanceOutcome::Cancelled),
            InstanceStatus::InProgress => Err(()),
        }
    }
}
