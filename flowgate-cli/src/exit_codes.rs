//! Exit code constants for CLI commands
//!
//! These constants define the standard exit codes used throughout the application:
//! - 0: Success
//! - 1: General error (IO, missing records)
//! - 2: Workflow rejection (validation, authorization, state)

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// General error
pub const EXIT_WARNING: i32 = 1;

/// Workflow rejection
pub const EXIT_ERROR: i32 = 2;
