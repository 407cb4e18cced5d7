//! End-to-end scenarios exercising the full engine surface

use flowgate::{
    ActionKind, AuthorityResolver, DelegationLedger, EntityKey, FlowgateError, InstanceOutcome,
    InstanceStatus, RoleName, RuleCondition, StaticRoleDirectory, TemplateName, TransitionAction,
    UserId, WorkflowEngine, WorkflowStep, WorkflowStore, WorkflowTemplate,
};
use std::sync::Barrier;
use std::thread;

fn three_role_directory() -> StaticRoleDirectory {
    let mut directory = StaticRoleDirectory::new();
    directory.assign(RoleName::new("AE"), UserId::new("alice"));
    directory.assign(RoleName::new("EE"), UserId::new("bob"));
    directory.assign(RoleName::new("CE"), UserId::new("carol"));
    directory
}

fn estimate_template(engine: &WorkflowEngine) -> WorkflowTemplate {
    engine
        .create_template(
            "estimates",
            TemplateName::new("Estimate approval"),
            vec![
                WorkflowStep::new(1, "AE", ActionKind::Verify).with_sla_hours(48),
                WorkflowStep::new(2, "EE", ActionKind::Approve),
                WorkflowStep::new(3, "CE", ActionKind::Sanction).with_remarks_required(),
            ],
        )
        .unwrap()
}

#[test]
fn scenario_full_approval_chain() {
    let engine = WorkflowEngine::new(WorkflowStore::memory());
    let template = estimate_template(&engine);
    let directory = three_role_directory();
    let ledger = DelegationLedger::new();
    let resolver = AuthorityResolver::new(&directory, &ledger);

    let instance = engine
        .create_instance(&template.id, EntityKey::new("estimate", "EST-100"))
        .unwrap();

    engine
        .forward(&instance.id, &UserId::new("alice"), "measurements verified", &resolver)
        .unwrap();
    engine
        .forward(&instance.id, &UserId::new("bob"), "technically sound", &resolver)
        .unwrap();
    let receipt = engine
        .forward(&instance.id, &UserId::new("carol"), "sanctioned", &resolver)
        .unwrap();

    assert_eq!(receipt.instance.status, InstanceStatus::Completed);
    assert_eq!(receipt.outcome.unwrap().outcome, InstanceOutcome::Completed);

    let history = engine.history(&instance.id).unwrap();
    assert_eq!(history.len(), 3);
    assert!(history
        .iter()
        .all(|e| e.action == TransitionAction::Forward));
    // Sequences increase monotonically even if timestamps collide.
    assert!(history.windows(2).all(|w| w[0].sequence < w[1].sequence));
}

#[test]
fn scenario_revert_then_resume() {
    let engine = WorkflowEngine::new(WorkflowStore::memory());
    let template = estimate_template(&engine);
    let directory = three_role_directory();
    let ledger = DelegationLedger::new();
    let resolver = AuthorityResolver::new(&directory, &ledger);

    let instance = engine
        .create_instance(&template.id, EntityKey::new("estimate", "EST-101"))
        .unwrap();

    engine
        .forward(&instance.id, &UserId::new("alice"), "ok", &resolver)
        .unwrap();
    engine
        .revert(&instance.id, &UserId::new("bob"), 1, "rates outdated", &resolver)
        .unwrap();

    // Back at step 1; the AE acts again and the chain resumes.
    engine
        .forward(&instance.id, &UserId::new("alice"), "rates fixed", &resolver)
        .unwrap();
    let current = engine.store().get_instance(&instance.id).unwrap().unwrap();
    assert_eq!(current.current_step_order, 2);
    assert_eq!(current.history.len(), 3);

    // The TAT report attributes two visits to step 1.
    let report = engine.tat(&instance.id).unwrap();
    assert_eq!(report.steps[0].step_order, 1);
}

#[test]
fn scenario_trigger_rules_route_by_amount() {
    let engine = WorkflowEngine::new(WorkflowStore::memory());
    let standard = estimate_template(&engine);
    let escalated = engine
        .create_template(
            "estimates",
            TemplateName::new("High value approval"),
            vec![
                WorkflowStep::new(1, "EE", ActionKind::Recommend),
                WorkflowStep::new(2, "CE", ActionKind::Sanction),
            ],
        )
        .unwrap();

    engine
        .add_rule(
            "estimates",
            RuleCondition::NumberAtLeast {
                attribute: "amount".to_string(),
                threshold: 500_000.0,
            },
            escalated.id,
            1,
        )
        .unwrap();
    engine
        .add_rule("estimates", RuleCondition::Always, standard.id, 100)
        .unwrap();

    let mut attrs = flowgate::EntityAttributes::new();
    attrs.insert("amount".to_string(), serde_json::json!(750_000));
    let big = engine
        .start_for_entity("estimates", EntityKey::new("estimate", "EST-102"), &attrs)
        .unwrap()
        .unwrap();
    assert_eq!(big.template_id, escalated.id);

    let mut attrs = flowgate::EntityAttributes::new();
    attrs.insert("amount".to_string(), serde_json::json!(10_000));
    let small = engine
        .start_for_entity("estimates", EntityKey::new("estimate", "EST-103"), &attrs)
        .unwrap()
        .unwrap();
    assert_eq!(small.template_id, standard.id);

    // Rules in an unrelated module never fire.
    let none = engine
        .start_for_entity("bills", EntityKey::new("bill", "B-1"), &attrs)
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn scenario_exclusive_delegation_hands_off_authority() {
    let engine = WorkflowEngine::new(WorkflowStore::memory());
    let template = estimate_template(&engine);
    let directory = three_role_directory();
    let mut ledger = DelegationLedger::new();
    ledger
        .delegate(
            UserId::new("alice"),
            UserId::new("dave"),
            RoleName::new("AE"),
            None,
            chrono::Utc::now() - chrono::Duration::hours(1),
            None,
            true,
        )
        .unwrap();
    let resolver = AuthorityResolver::new(&directory, &ledger);

    let instance = engine
        .create_instance(&template.id, EntityKey::new("estimate", "EST-104"))
        .unwrap();

    // Alice handed off exclusively; only Dave may act.
    let denied = engine.forward(&instance.id, &UserId::new("alice"), "ok", &resolver);
    match denied {
        Err(FlowgateError::Workflow(e)) => assert_eq!(e.kind(), "UnauthorizedActionError"),
        other => panic!("expected UnauthorizedActionError, got {other:?}"),
    }

    let receipt = engine
        .forward(&instance.id, &UserId::new("dave"), "verified", &resolver)
        .unwrap();
    assert_eq!(receipt.instance.current_step_order, 2);
    assert_eq!(
        receipt.instance.history.last().unwrap().acting_role.as_str(),
        "AE"
    );
}

#[test]
fn scenario_concurrent_forwards_have_one_winner() {
    let engine = WorkflowEngine::new(WorkflowStore::memory());
    let template = estimate_template(&engine);
    let mut directory = three_role_directory();
    // Two users both hold AE so both are authorized to race.
    directory.assign(RoleName::new("AE"), UserId::new("alan"));

    let instance = engine
        .create_instance(&template.id, EntityKey::new("estimate", "EST-105"))
        .unwrap();

    let barrier = Barrier::new(2);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = ["alice", "alan"]
            .into_iter()
            .map(|user| {
                let engine = engine.clone();
                let directory = &directory;
                let barrier = &barrier;
                let instance_id = instance.id;
                s.spawn(move || {
                    let ledger = DelegationLedger::new();
                    let resolver = AuthorityResolver::new(directory, &ledger);
                    barrier.wait();
                    engine.forward(&instance_id, &UserId::new(user), "racing", &resolver)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Exactly one forward wins; the loser fails cleanly because the
    // step already moved past the role it was authorized for.
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    match loser {
        Err(FlowgateError::Workflow(e)) => assert_eq!(e.kind(), "UnauthorizedActionError"),
        other => panic!("expected UnauthorizedActionError, got {other:?}"),
    }

    // The instance advanced exactly once and logged exactly one entry.
    let current = engine.store().get_instance(&instance.id).unwrap().unwrap();
    assert_eq!(current.current_step_order, 2);
    assert_eq!(current.history.len(), 1);
}

#[test]
fn scenario_concurrent_creates_yield_single_instance() {
    let engine = WorkflowEngine::new(WorkflowStore::memory());
    let template = estimate_template(&engine);

    let barrier = Barrier::new(4);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let template_id = template.id;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    engine.create_instance(&template_id, EntityKey::new("estimate", "EST-106"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(
            r,
            Err(FlowgateError::Workflow(e)) if e.kind() == "DuplicateActiveInstanceError"
        )));
}

#[test]
fn scenario_file_system_store_survives_reopen() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let directory = three_role_directory();
    let ledger = DelegationLedger::new();

    let instance_id = {
        let engine =
            WorkflowEngine::new(WorkflowStore::file_system(temp_dir.path()).unwrap());
        let template = estimate_template(&engine);
        let resolver = AuthorityResolver::new(&directory, &ledger);
        let instance = engine
            .create_instance(&template.id, EntityKey::new("bill", "B-55"))
            .unwrap();
        engine
            .forward(&instance.id, &UserId::new("alice"), "verified", &resolver)
            .unwrap();
        instance.id
    };

    // A fresh engine over the same directory picks up exactly where the
    // first left off.
    let engine = WorkflowEngine::new(WorkflowStore::file_system(temp_dir.path()).unwrap());
    let instance = engine.store().get_instance(&instance_id).unwrap().unwrap();
    assert_eq!(instance.current_step_order, 2);
    assert_eq!(instance.history.len(), 1);

    let resolver = AuthorityResolver::new(&directory, &ledger);
    let receipt = engine
        .forward(&instance_id, &UserId::new("bob"), "approved", &resolver)
        .unwrap();
    assert_eq!(receipt.instance.current_step_order, 3);
}

#[test]
fn scenario_cancel_frees_entity_for_new_run() {
    let engine = WorkflowEngine::new(WorkflowStore::memory());
    let template = estimate_template(&engine);

    let first = engine
        .create_instance(&template.id, EntityKey::new("tender", "T-9"))
        .unwrap();
    let receipt = engine
        .cancel(&first.id, &UserId::new("admin"), "superseded")
        .unwrap();
    assert_eq!(receipt.instance.status, InstanceStatus::Cancelled);
    assert_eq!(receipt.outcome.unwrap().outcome, InstanceOutcome::Cancelled);
    assert_eq!(
        receipt.instance.history.last().unwrap().action,
        TransitionAction::Cancel
    );

    let second = engine
        .create_instance(&template.id, EntityKey::new("tender", "T-9"))
        .unwrap();
    assert_ne!(first.id, second.id);
}
