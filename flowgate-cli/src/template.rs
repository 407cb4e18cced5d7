//! `flowgate template` subcommands

use anyhow::{anyhow, bail, Result};
use flowgate::{ActionKind, TemplateId, TemplateName, WorkflowStep, WorkflowTemplate};
use tabled::{Table, Tabled};

use crate::cli::{OutputFormat, TemplateCommands};
use crate::context::CliContext;

/// Parse a `ROLE:ACTION[:SLA_HOURS][:remarks]` step spec
pub fn parse_step_spec(step_order: u32, spec: &str) -> Result<WorkflowStep> {
    let mut parts = spec.split(':');
    let role = parts
        .next()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| anyhow!("Step spec '{spec}' is missing a role"))?;
    let action: ActionKind = parts
        .next()
        .unwrap_or("")
        .parse()
        .map_err(|e| anyhow!("Step spec '{spec}': {e}"))?;

    let mut step = WorkflowStep::new(step_order, role.trim(), action);
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.eq_ignore_ascii_case("remarks") {
            step = step.with_remarks_required();
        } else if let Ok(hours) = part.parse::<u32>() {
            step = step.with_sla_hours(hours);
        } else {
            bail!("Step spec '{spec}' has an unrecognized suffix '{part}'");
        }
    }
    Ok(step)
}

fn parse_steps(specs: &[String]) -> Result<Vec<WorkflowStep>> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| parse_step_spec(i as u32 + 1, spec))
        .collect()
}

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Steps")]
    steps: String,
}

fn template_row(template: &WorkflowTemplate) -> TemplateRow {
    let steps = template
        .steps()
        .iter()
        .map(|s| format!("{}.{} {}", s.step_order, s.role, s.action_kind.as_str()))
        .collect::<Vec<_>>()
        .join(" -> ");
    TemplateRow {
        id: template.id.to_string(),
        module: template.module.clone(),
        name: template.name.to_string(),
        active: template.is_active,
        steps,
    }
}

pub fn run_template_command(subcommand: TemplateCommands, context: &CliContext) -> Result<()> {
    match subcommand {
        TemplateCommands::Create {
            module,
            name,
            steps,
        } => {
            let name = TemplateName::try_new(name)?;
            let template = context
                .engine
                .create_template(module, name, parse_steps(&steps)?)?;
            println!("Created template {}", template.id);
        }
        TemplateCommands::AddStep { template_id, step } => {
            let id = TemplateId::parse(&template_id).map_err(|e| anyhow!(e))?;
            let current = context
                .engine
                .store()
                .get_template(&id)?
                .map(|t| t.len())
                .unwrap_or(0);
            let template = context
                .engine
                .add_step(&id, parse_step_spec(current + 1, &step)?)?;
            println!("Template {} now has {} steps", template.id, template.len());
        }
        TemplateCommands::Reorder { template_id, steps } => {
            let id = TemplateId::parse(&template_id).map_err(|e| anyhow!(e))?;
            context.engine.reorder_steps(&id, parse_steps(&steps)?)?;
            println!("Replaced steps of template {id}");
        }
        TemplateCommands::Deactivate { template_id } => {
            let id = TemplateId::parse(&template_id).map_err(|e| anyhow!(e))?;
            context.engine.deactivate_template(&id)?;
            println!("Deactivated template {id}");
        }
        TemplateCommands::List { format } => {
            let mut templates = context.engine.store().list_templates()?;
            templates.sort_by(|a, b| a.module.cmp(&b.module).then(a.name.cmp(&b.name)));
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&templates)?)
                }
                OutputFormat::Table => {
                    let rows: Vec<_> = templates.iter().map(template_row).collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
    }
    Ok(())
}
