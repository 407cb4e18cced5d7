//! `flowgate delegation` and `flowgate role` subcommands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flowgate::{Delegation, DelegationId, RoleName, UserId};
use tabled::{Table, Tabled};

use crate::cli::{DelegationCommands, OutputFormat, RoleCommands};
use crate::context::CliContext;

fn parse_time(s: &str, flag: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("{flag} '{s}' is not an RFC 3339 timestamp"))
}

#[derive(Tabled)]
struct DelegationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Window")]
    window: String,
    #[tabled(rename = "Exclusive")]
    exclusive: bool,
    #[tabled(rename = "Active")]
    active: bool,
}

fn delegation_row(delegation: &Delegation, now: DateTime<Utc>) -> DelegationRow {
    let until = match (delegation.revoked_at, delegation.ends_at) {
        (Some(revoked), _) => format!("revoked {}", revoked.to_rfc3339()),
        (None, Some(ends)) => ends.to_rfc3339(),
        (None, None) => "indefinite".to_string(),
    };
    DelegationRow {
        id: delegation.id.to_string(),
        from: delegation.delegator.to_string(),
        to: delegation.delegate.to_string(),
        role: delegation.role.to_string(),
        module: delegation
            .module
            .clone()
            .unwrap_or_else(|| "*".to_string()),
        window: format!("{} .. {}", delegation.starts_at.to_rfc3339(), until),
        exclusive: delegation.exclusive,
        active: delegation.is_active_at(now),
    }
}

pub fn run_delegation_command(
    subcommand: DelegationCommands,
    context: &mut CliContext,
) -> Result<()> {
    match subcommand {
        DelegationCommands::Add {
            delegator,
            delegate,
            role,
            module,
            starts,
            ends,
            exclusive,
        } => {
            let starts_at = match starts {
                Some(s) => parse_time(&s, "--starts")?,
                None => Utc::now(),
            };
            let ends_at = ends.map(|s| parse_time(&s, "--ends")).transpose()?;
            let delegation = context.ledger.delegate(
                UserId::try_new(delegator)?,
                UserId::try_new(delegate)?,
                RoleName::try_new(role)?,
                module,
                starts_at,
                ends_at,
                exclusive,
            )?;
            let id = delegation.id;
            context.save_ledger()?;
            println!("Recorded delegation {id}");
        }
        DelegationCommands::Revoke { delegation_id } => {
            let id = DelegationId::parse(&delegation_id)?;
            context.ledger.revoke(&id, Utc::now())?;
            context.save_ledger()?;
            println!("Revoked delegation {id}");
        }
        DelegationCommands::List { format } => {
            let now = Utc::now();
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(context.ledger.delegations())?
                ),
                OutputFormat::Table => {
                    let rows: Vec<_> = context
                        .ledger
                        .delegations()
                        .iter()
                        .map(|d| delegation_row(d, now))
                        .collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
    }
    Ok(())
}

pub fn run_role_command(subcommand: RoleCommands, context: &mut CliContext) -> Result<()> {
    match subcommand {
        RoleCommands::Assign { role, user } => {
            context
                .directory
                .assign(RoleName::try_new(role)?, UserId::try_new(user)?);
            context.save_directory()?;
            println!("Assigned");
        }
        RoleCommands::Unassign { role, user } => {
            context
                .directory
                .unassign(&RoleName::try_new(role)?, &UserId::try_new(user)?);
            context.save_directory()?;
            println!("Unassigned");
        }
        RoleCommands::List { format } => {
            let mut assignments: Vec<(String, Vec<String>)> = context
                .directory
                .assignments()
                .map(|(role, users)| {
                    let mut users: Vec<String> =
                        users.iter().map(|u| u.to_string()).collect();
                    users.sort();
                    (role.to_string(), users)
                })
                .collect();
            assignments.sort();

            match format {
                OutputFormat::Json => {
                    let map: serde_json::Map<String, serde_json::Value> = assignments
                        .into_iter()
                        .map(|(role, users)| (role, serde_json::json!(users)))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&map)?);
                }
                OutputFormat::Table => {
                    #[derive(Tabled)]
                    struct RoleRow {
                        #[tabled(rename = "Role")]
                        role: String,
                        #[tabled(rename = "Users")]
                        users: String,
                    }
                    let rows: Vec<_> = assignments
                        .into_iter()
                        .map(|(role, users)| RoleRow {
                            role,
                            users: users.join(", "),
                        })
                        .collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
    }
    Ok(())
}
