//! `flowgate rule` subcommands

use anyhow::{anyhow, bail, Result};
use flowgate::{RuleCondition, RuleId, TemplateId, TriggerRule};
use tabled::{Table, Tabled};

use crate::cli::{ConditionKind, OutputFormat, RuleCommands};
use crate::context::CliContext;

fn build_condition(
    kind: ConditionKind,
    attribute: Option<String>,
    value: Option<String>,
) -> Result<RuleCondition> {
    let require_attribute =
        || attribute.clone().ok_or_else(|| anyhow!("This condition kind requires --attribute"));
    let require_value =
        || value.clone().ok_or_else(|| anyhow!("This condition kind requires --value"));
    let numeric = |v: String| {
        v.parse::<f64>()
            .map_err(|_| anyhow!("--value '{v}' is not a number"))
    };

    Ok(match kind {
        ConditionKind::Always => RuleCondition::Always,
        ConditionKind::NumberAtLeast => RuleCondition::NumberAtLeast {
            attribute: require_attribute()?,
            threshold: numeric(require_value()?)?,
        },
        ConditionKind::NumberBelow => RuleCondition::NumberBelow {
            attribute: require_attribute()?,
            threshold: numeric(require_value()?)?,
        },
        ConditionKind::StringEquals => RuleCondition::StringEquals {
            attribute: require_attribute()?,
            value: require_value()?,
        },
    })
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Priority")]
    priority: i32,
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Template")]
    template: String,
    #[tabled(rename = "Active")]
    active: bool,
}

fn describe_condition(condition: &RuleCondition) -> String {
    match condition {
        RuleCondition::Always => "always".to_string(),
        RuleCondition::NumberAtLeast {
            attribute,
            threshold,
        } => format!("{attribute} >= {threshold}"),
        RuleCondition::NumberBelow {
            attribute,
            threshold,
        } => format!("{attribute} < {threshold}"),
        RuleCondition::StringEquals { attribute, value } => format!("{attribute} == '{value}'"),
    }
}

fn rule_row(rule: &TriggerRule) -> RuleRow {
    RuleRow {
        id: rule.id.to_string(),
        module: rule.module.clone(),
        priority: rule.priority,
        condition: describe_condition(&rule.condition),
        template: rule.template_id.to_string(),
        active: rule.is_active,
    }
}

pub fn run_rule_command(subcommand: RuleCommands, context: &CliContext) -> Result<()> {
    match subcommand {
        RuleCommands::Add {
            module,
            template_id,
            priority,
            kind,
            attribute,
            value,
        } => {
            if matches!(kind, ConditionKind::Always) && (attribute.is_some() || value.is_some()) {
                bail!("--attribute and --value do not apply to the `always` condition");
            }
            let template_id = TemplateId::parse(&template_id).map_err(|e| anyhow!(e))?;
            let condition = build_condition(kind, attribute, value)?;
            let rule = context
                .engine
                .add_rule(module, condition, template_id, priority)?;
            println!("Added rule {}", rule.id);
        }
        RuleCommands::Remove { rule_id } => {
            let id = RuleId::parse(&rule_id).map_err(|e| anyhow!(e))?;
            context.engine.remove_rule(&id)?;
            println!("Removed rule {id}");
        }
        RuleCommands::List { format } => {
            let mut rules = context.engine.store().list_rules()?;
            rules.sort_by(|a, b| a.module.cmp(&b.module).then(a.priority.cmp(&b.priority)));
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rules)?),
                OutputFormat::Table => {
                    let rows: Vec<_> = rules.iter().map(rule_row).collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
    }
    Ok(())
}
