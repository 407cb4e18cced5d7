use std::process;

mod cli;
mod context;
mod delegation;
mod error;
mod exit_codes;
mod instance;
mod rule;
mod template;

use clap::CommandFactory;
use cli::{Cli, Commands};
use context::CliContext;
use error::report_error;
use exit_codes::EXIT_SUCCESS;

fn main() {
    let cli = Cli::parse_args();

    if cli.command.is_none() {
        Cli::command().print_help().expect("Failed to print help");
        process::exit(EXIT_SUCCESS);
    }

    use tracing::Level;
    let log_level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level)
        .init();

    let result = run(cli);
    let exit_code = match result {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => report_error(&err),
    };
    process::exit(exit_code);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut context = CliContext::open(cli.data_dir)?;

    match cli.command {
        Some(Commands::Template { subcommand }) => {
            template::run_template_command(subcommand, &context)
        }
        Some(Commands::Rule { subcommand }) => rule::run_rule_command(subcommand, &context),
        Some(Commands::Instance { subcommand }) => {
            instance::run_instance_command(subcommand, &context)
        }
        Some(Commands::Delegation { subcommand }) => {
            delegation::run_delegation_command(subcommand, &mut context)
        }
        Some(Commands::Role { subcommand }) => {
            delegation::run_role_command(subcommand, &mut context)
        }
        Some(Commands::Sweep { format }) => instance::run_sweep_command(format, &context),
        None => unreachable!(),
    }
}
