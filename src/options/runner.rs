//! External command execution.

use crate::error::{AdminError, Result};
use std::process::Command;
use tracing::debug;

/// Runs a program and returns its stdout lines.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<Vec<String>>;
}

/// Runs commands on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<Vec<String>> {
        debug!("Running {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| AdminError::command_error(format!("{}: {}", program, e)))?;

        if !output.status.success() {
            return Err(AdminError::command_error(format!(
                "{} exited with {}",
                program, output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_command_error() {
        let result = SystemRunner.run("/nonexistent/show-admin-tool", &[]);
        assert!(matches!(result, Err(AdminError::Command(_))));
    }
}
