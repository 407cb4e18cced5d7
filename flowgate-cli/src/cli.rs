use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ConditionKind {
    Always,
    NumberAtLeast,
    NumberBelow,
    StringEquals,
}

#[derive(Parser, Debug)]
#[command(name = "flowgate")]
#[command(version)]
#[command(about = "A configurable multi-step approval workflow engine")]
#[command(long_about = "
flowgate manages multi-step approval workflows: templates define
role-bound approval chains, trigger rules attach them to new entities,
and instances walk the chain one approval at a time with delegation,
audit history, and SLA tracking.

Example usage:
  flowgate template create --module estimates --name 'Estimate approval' \\
      --step 'AE:VERIFY:48' --step 'EE:APPROVE'
  flowgate instance start --template <ID> --entity-type estimate --entity-id EST-1
  flowgate instance forward <INSTANCE-ID> --user alice --remarks 'verified'
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Data directory (defaults to ~/.flowgate)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage workflow templates
    Template {
        #[command(subcommand)]
        subcommand: TemplateCommands,
    },
    /// Manage trigger rules
    Rule {
        #[command(subcommand)]
        subcommand: RuleCommands,
    },
    /// Start, transition, and inspect workflow instances
    Instance {
        #[command(subcommand)]
        subcommand: InstanceCommands,
    },
    /// Manage delegations of approval authority
    Delegation {
        #[command(subcommand)]
        subcommand: DelegationCommands,
    },
    /// Manage role membership
    Role {
        #[command(subcommand)]
        subcommand: RoleCommands,
    },
    /// Report every in-progress instance past its step SLA
    #[command(long_about = "
Scans all in-progress instances and reports every one whose current
step has exceeded its SLA window. Read-only: nothing is escalated or
transitioned.

Example:
  flowgate sweep --format json
")]
    Sweep {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Create a template from an ordered list of steps
    #[command(long_about = "
Creates a workflow template. Each --step is ROLE:ACTION with optional
:SLA_HOURS and :remarks suffixes, in step order:

  flowgate template create --module estimates --name 'Estimate approval' \\
      --step 'AE:VERIFY:48' --step 'EE:APPROVE:24' --step 'CE:SANCTION::remarks'

Actions: VERIFY, RECOMMEND, APPROVE, SANCTION, REVIEW.
")]
    Create {
        /// Module the template belongs to (e.g. estimates, bills)
        #[arg(long)]
        module: String,
        /// Template name
        #[arg(long)]
        name: String,
        /// Step spec ROLE:ACTION[:SLA_HOURS][:remarks], repeated in order
        #[arg(long = "step", required = true)]
        steps: Vec<String>,
    },
    /// Append a step to the end of a template
    AddStep {
        /// Template ID
        template_id: String,
        /// Step spec ROLE:ACTION[:SLA_HOURS][:remarks]
        step: String,
    },
    /// Replace a template's step sequence
    ///
    /// Refused while any instance of the template is in progress.
    Reorder {
        /// Template ID
        template_id: String,
        /// New step specs, repeated in order
        #[arg(long = "step", required = true)]
        steps: Vec<String>,
    },
    /// Exclude a template from new trigger matching
    Deactivate {
        /// Template ID
        template_id: String,
    },
    /// List all templates
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    /// Add a trigger rule attaching a template to matching entities
    #[command(long_about = "
Adds a trigger rule. Rules for a module are evaluated in ascending
priority order; the first active rule whose condition matches the
entity's attributes picks the template.

  flowgate rule add --module estimates --template <ID> --priority 1 \\
      --kind number-at-least --attribute amount --value 500000
  flowgate rule add --module estimates --template <ID> --priority 100 --kind always
")]
    Add {
        /// Module the rule applies to
        #[arg(long)]
        module: String,
        /// Template to attach on match
        #[arg(long = "template")]
        template_id: String,
        /// Evaluation priority; lower runs first
        #[arg(long)]
        priority: i32,
        /// Condition kind
        #[arg(long, value_enum)]
        kind: ConditionKind,
        /// Attribute the condition inspects (unused for `always`)
        #[arg(long)]
        attribute: Option<String>,
        /// Comparison value (number for numeric kinds, string otherwise)
        #[arg(long)]
        value: Option<String>,
    },
    /// Remove a trigger rule
    Remove {
        /// Rule ID
        rule_id: String,
    },
    /// List all trigger rules
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum InstanceCommands {
    /// Start an instance of an explicit template for an entity
    Start {
        /// Template ID
        #[arg(long = "template")]
        template_id: String,
        /// Entity type (e.g. estimate, bill)
        #[arg(long)]
        entity_type: String,
        /// Entity ID
        #[arg(long)]
        entity_id: String,
    },
    /// Evaluate trigger rules for an entity and start a matching workflow
    #[command(long_about = "
Evaluates the module's trigger rules against the entity's attributes
(a JSON object) and starts an instance of the first matching template.

  flowgate instance trigger --module estimates --entity-type estimate \\
      --entity-id EST-7 --attributes '{\"amount\": 750000}'
")]
    Trigger {
        /// Module whose rules to evaluate
        #[arg(long)]
        module: String,
        /// Entity type
        #[arg(long)]
        entity_type: String,
        /// Entity ID
        #[arg(long)]
        entity_id: String,
        /// Entity attributes as a JSON object
        #[arg(long, default_value = "{}")]
        attributes: String,
    },
    /// Approve the current step and advance (or complete) the instance
    Forward {
        /// Instance ID
        instance_id: String,
        /// Acting user
        #[arg(long)]
        user: String,
        /// Remarks (required at steps that demand them)
        #[arg(long, default_value = "")]
        remarks: String,
    },
    /// Send the instance back to an earlier step for rework
    Revert {
        /// Instance ID
        instance_id: String,
        /// Acting user
        #[arg(long)]
        user: String,
        /// Step to send the instance back to
        #[arg(long)]
        to_step: u32,
        /// Remarks explaining what to fix
        #[arg(long, default_value = "")]
        remarks: String,
    },
    /// Reject the instance at the current step (terminal)
    Reject {
        /// Instance ID
        instance_id: String,
        /// Acting user
        #[arg(long)]
        user: String,
        /// Remarks explaining the rejection (always required)
        #[arg(long)]
        remarks: String,
    },
    /// Administratively cancel the instance (terminal)
    Cancel {
        /// Instance ID
        instance_id: String,
        /// Acting user
        #[arg(long)]
        user: String,
        /// Optional remarks
        #[arg(long, default_value = "")]
        remarks: String,
    },
    /// Show an instance's current state
    Show {
        /// Instance ID
        instance_id: String,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Show an instance's audit history
    History {
        /// Instance ID
        instance_id: String,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Show an instance's turnaround-time report
    Tat {
        /// Instance ID
        instance_id: String,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// List everything waiting on a user
    Pending {
        /// The user to build the worklist for
        #[arg(long)]
        user: String,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// List all instances
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum DelegationCommands {
    /// Delegate a role's approval authority to another user
    #[command(long_about = "
Delegates approval authority for a role from one user to another for a
time window. Delegation is additive: the delegator keeps acting unless
--exclusive is given. Times are RFC 3339; --starts defaults to now and
an omitted --ends means indefinite.

  flowgate delegation add --from alice --to dave --role AE \\
      --ends 2026-09-15T00:00:00Z
")]
    Add {
        /// Delegating user
        #[arg(long = "from")]
        delegator: String,
        /// Receiving user
        #[arg(long = "to")]
        delegate: String,
        /// Role being delegated
        #[arg(long)]
        role: String,
        /// Restrict the delegation to one module
        #[arg(long)]
        module: Option<String>,
        /// When the delegation takes effect (RFC 3339, default now)
        #[arg(long)]
        starts: Option<String>,
        /// When the delegation lapses (RFC 3339, default indefinite)
        #[arg(long)]
        ends: Option<String>,
        /// The delegator gives up their own authority for the window
        #[arg(long)]
        exclusive: bool,
    },
    /// Revoke a delegation immediately
    Revoke {
        /// Delegation ID
        delegation_id: String,
    },
    /// List all delegations
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoleCommands {
    /// Add a user to a role
    Assign {
        /// Role name
        #[arg(long)]
        role: String,
        /// User ID
        #[arg(long)]
        user: String,
    },
    /// Remove a user from a role
    Unassign {
        /// Role name
        #[arg(long)]
        role: String,
        /// User ID
        #[arg(long)]
        user: String,
    },
    /// List role membership
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
