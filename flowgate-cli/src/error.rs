//! Structured error reporting for CLI commands

use crate::exit_codes::{EXIT_ERROR, EXIT_WARNING};
use colored::Colorize;
use flowgate::FlowgateError;
use is_terminal::IsTerminal;
use std::io;

/// Print an error and pick the exit code
///
/// On a terminal this is a colored one-liner; otherwise a structured
/// `{kind, message}` JSON object goes to stderr so callers can parse
/// failures programmatically.
pub fn report_error(err: &anyhow::Error) -> i32 {
    let (kind, code) = match err.downcast_ref::<FlowgateError>() {
        Some(e @ FlowgateError::Workflow(_)) => (e.kind(), EXIT_ERROR),
        Some(e) => (e.kind(), EXIT_WARNING),
        None => ("InternalError", EXIT_WARNING),
    };

    if io::stderr().is_terminal() {
        eprintln!("{} [{}] {:#}", "error".red().bold(), kind, err);
    } else {
        let body = serde_json::json!({
            "kind": kind,
            "message": format!("{err:#}"),
        });
        eprintln!("{body}");
    }
    code
}
