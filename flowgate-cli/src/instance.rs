//! `flowgate instance` subcommands and the SLA sweep

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use flowgate::{
    EntityAttributes, EntityKey, TemplateId, TransitionReceipt, UserId, WorkflowInstance,
    WorkflowInstanceId,
};
use tabled::{Table, Tabled};

use crate::cli::{InstanceCommands, OutputFormat};
use crate::context::CliContext;

#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Step")]
    step: u32,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created: String,
}

fn instance_row(instance: &WorkflowInstance) -> InstanceRow {
    InstanceRow {
        id: instance.id.to_string(),
        entity: instance.entity_key.to_string(),
        module: instance.module.clone(),
        step: instance.current_step_order,
        status: instance.status.to_string(),
        created: instance.created_at.to_rfc3339(),
    }
}

fn print_receipt(receipt: &TransitionReceipt) {
    let instance = &receipt.instance;
    match &receipt.outcome {
        Some(event) => println!(
            "Instance {} for {} is {}",
            instance.id, event.entity_key, instance.status
        ),
        None => println!(
            "Instance {} now at step {}",
            instance.id, instance.current_step_order
        ),
    }
}

fn parse_instance_id(s: &str) -> Result<WorkflowInstanceId> {
    Ok(WorkflowInstanceId::parse(s)?)
}

fn parse_user(s: String) -> Result<UserId> {
    Ok(UserId::try_new(s)?)
}

pub fn run_instance_command(subcommand: InstanceCommands, context: &CliContext) -> Result<()> {
    match subcommand {
        InstanceCommands::Start {
            template_id,
            entity_type,
            entity_id,
        } => {
            let template_id = TemplateId::parse(&template_id).map_err(|e| anyhow!(e))?;
            let instance = context
                .engine
                .create_instance(&template_id, EntityKey::new(entity_type, entity_id))?;
            println!("Started instance {}", instance.id);
        }
        InstanceCommands::Trigger {
            module,
            entity_type,
            entity_id,
            attributes,
        } => {
            let attributes: EntityAttributes = serde_json::from_str(&attributes)
                .context("--attributes must be a JSON object")?;
            let started = context.engine.start_for_entity(
                &module,
                EntityKey::new(entity_type, entity_id),
                &attributes,
            )?;
            match started {
                Some(instance) => println!(
                    "Started instance {} from template {}",
                    instance.id, instance.template_id
                ),
                None => println!("No trigger rule matched; no workflow started"),
            }
        }
        InstanceCommands::Forward {
            instance_id,
            user,
            remarks,
        } => {
            let id = parse_instance_id(&instance_id)?;
            let receipt = context
                .engine
                .forward(&id, &parse_user(user)?, &remarks, &context.resolver())?;
            print_receipt(&receipt);
        }
        InstanceCommands::Revert {
            instance_id,
            user,
            to_step,
            remarks,
        } => {
            let id = parse_instance_id(&instance_id)?;
            let receipt = context.engine.revert(
                &id,
                &parse_user(user)?,
                to_step,
                &remarks,
                &context.resolver(),
            )?;
            print_receipt(&receipt);
        }
        InstanceCommands::Reject {
            instance_id,
            user,
            remarks,
        } => {
            let id = parse_instance_id(&instance_id)?;
            let receipt = context
                .engine
                .reject(&id, &parse_user(user)?, &remarks, &context.resolver())?;
            print_receipt(&receipt);
        }
        InstanceCommands::Cancel {
            instance_id,
            user,
            remarks,
        } => {
            let id = parse_instance_id(&instance_id)?;
            let receipt = context.engine.cancel(&id, &parse_user(user)?, &remarks)?;
            print_receipt(&receipt);
        }
        InstanceCommands::Show {
            instance_id,
            format,
        } => {
            let id = parse_instance_id(&instance_id)?;
            let instance = context
                .engine
                .store()
                .get_instance(&id)?
                .ok_or_else(|| anyhow!("Instance {id} not found"))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&instance)?),
                OutputFormat::Table => {
                    println!("{}", Table::new(vec![instance_row(&instance)]))
                }
            }
        }
        InstanceCommands::History {
            instance_id,
            format,
        } => {
            let id = parse_instance_id(&instance_id)?;
            let history = context.engine.history(&id)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
                OutputFormat::Table => {
                    #[derive(Tabled)]
                    struct HistoryRow {
                        #[tabled(rename = "#")]
                        sequence: u64,
                        #[tabled(rename = "When")]
                        when: String,
                        #[tabled(rename = "User")]
                        user: String,
                        #[tabled(rename = "Role")]
                        role: String,
                        #[tabled(rename = "Action")]
                        action: String,
                        #[tabled(rename = "From")]
                        from: u32,
                        #[tabled(rename = "To")]
                        to: String,
                        #[tabled(rename = "Remarks")]
                        remarks: String,
                    }
                    let rows: Vec<_> = history
                        .iter()
                        .map(|e| HistoryRow {
                            sequence: e.sequence,
                            when: e.timestamp.to_rfc3339(),
                            user: e.acting_user.to_string(),
                            role: e.acting_role.to_string(),
                            action: e.action.to_string(),
                            from: e.from_step,
                            to: e
                                .to_step
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| "-".to_string()),
                            remarks: e.remarks.clone(),
                        })
                        .collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
        InstanceCommands::Tat {
            instance_id,
            format,
        } => {
            let id = parse_instance_id(&instance_id)?;
            let report = context.engine.tat(&id)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Table => {
                    #[derive(Tabled)]
                    struct TatRow {
                        #[tabled(rename = "Step")]
                        step: u32,
                        #[tabled(rename = "Role")]
                        role: String,
                        #[tabled(rename = "Elapsed (h)")]
                        elapsed_hours: String,
                        #[tabled(rename = "SLA (h)")]
                        sla: String,
                        #[tabled(rename = "Overdue")]
                        overdue: bool,
                    }
                    let rows: Vec<_> = report
                        .steps
                        .iter()
                        .map(|s| TatRow {
                            step: s.step_order,
                            role: s.role.to_string(),
                            elapsed_hours: format!("{:.1}", s.elapsed.as_secs_f64() / 3600.0),
                            sla: s
                                .sla_hours
                                .map(|h| h.to_string())
                                .unwrap_or_else(|| "-".to_string()),
                            overdue: s.overdue,
                        })
                        .collect();
                    println!("{}", Table::new(rows));
                    println!(
                        "Total: {:.1}h",
                        report.total_elapsed.as_secs_f64() / 3600.0
                    );
                }
            }
        }
        InstanceCommands::Pending { user, format } => {
            let pending = context
                .engine
                .pending_for_user(&parse_user(user)?, &context.resolver())?;
            match format {
                OutputFormat::Json => {
                    let items: Vec<_> = pending
                        .iter()
                        .map(|p| {
                            serde_json::json!({
                                "instance_id": p.instance_id.to_string(),
                                "entity": p.entity_key.to_string(),
                                "module": p.module,
                                "step": p.step_order,
                                "role": p.role.to_string(),
                                "action": p.action_kind.as_str(),
                                "waiting_since": p.waiting_since.to_rfc3339(),
                                "overdue": p.overdue,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&items)?);
                }
                OutputFormat::Table => {
                    #[derive(Tabled)]
                    struct PendingRow {
                        #[tabled(rename = "Instance")]
                        instance: String,
                        #[tabled(rename = "Entity")]
                        entity: String,
                        #[tabled(rename = "Step")]
                        step: u32,
                        #[tabled(rename = "Action")]
                        action: String,
                        #[tabled(rename = "Waiting since")]
                        waiting_since: String,
                        #[tabled(rename = "Overdue")]
                        overdue: bool,
                    }
                    let rows: Vec<_> = pending
                        .iter()
                        .map(|p| PendingRow {
                            instance: p.instance_id.to_string(),
                            entity: p.entity_key.to_string(),
                            step: p.step_order,
                            action: p.action_kind.as_str().to_string(),
                            waiting_since: p.waiting_since.to_rfc3339(),
                            overdue: p.overdue,
                        })
                        .collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
        InstanceCommands::List { format } => {
            let mut instances = context.engine.store().list_instances()?;
            instances.sort_by_key(|i| i.created_at);
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&instances)?)
                }
                OutputFormat::Table => {
                    let rows: Vec<_> = instances.iter().map(instance_row).collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
    }
    Ok(())
}

pub fn run_sweep_command(format: OutputFormat, context: &CliContext) -> Result<()> {
    let alerts = context.engine.sweep_overdue(Utc::now())?;
    match format {
        OutputFormat::Json => {
            let items: Vec<_> = alerts
                .iter()
                .map(|a| {
                    serde_json::json!({
                        "instance_id": a.instance_id.to_string(),
                        "entity": a.entity_key.to_string(),
                        "step": a.step_order,
                        "role": a.role.to_string(),
                        "sla_hours": a.sla_hours,
                        "waiting_since": a.waiting_since.to_rfc3339(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Table => {
            if alerts.is_empty() {
                println!("No overdue steps");
                return Ok(());
            }
            #[derive(Tabled)]
            struct AlertRow {
                #[tabled(rename = "Instance")]
                instance: String,
                #[tabled(rename = "Entity")]
                entity: String,
                #[tabled(rename = "Step")]
                step: u32,
                #[tabled(rename = "Role")]
                role: String,
                #[tabled(rename = "SLA (h)")]
                sla_hours: u32,
                #[tabled(rename = "Waiting since")]
                waiting_since: String,
            }
            let rows: Vec<_> = alerts
                .iter()
                .map(|a| AlertRow {
                    instance: a.instance_id.to_string(),
                    entity: a.entity_key.to_string(),
                    step: a.step_order,
                    role: a.role.to_string(),
                    sla_hours: a.sla_hours,
                    waiting_since: a.waiting_since.to_rfc3339(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }
    Ok(())
}
