//! Process execution helpers for external tools (compiler, formatter, signer).

use std::process::Command;

use crate::error::UtilError;

/// Structured output from a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    /// Standard output as a string.
    pub stdout: String,
    /// Standard error as a string.
    pub stderr: String,
    /// Whether the command exited successfully.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// The last `lines` non-empty lines of stderr, falling back to stdout.
    ///
    /// Used as the diagnostic attached to a failed task.
    pub fn tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let kept: Vec<&str> = source
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = kept.len().saturating_sub(lines);
        kept.get(start..).unwrap_or_default().join("\n")
    }
}

/// Execute a command and capture its output.
///
/// # Errors
/// Returns an error if the command cannot be spawned (e.g. binary not found).
/// A non-zero exit code is **not** an error; check `CommandOutput::success` instead.
pub fn run_command(cmd: &mut Command) -> Result<CommandOutput, UtilError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    tracing::debug!(%program, "spawning");

    let output = cmd
        .output()
        .map_err(|source| UtilError::CommandExec { program, source })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        exit_code: output.status.code(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn run_command_success() {
        let output = run_command(Command::new("echo").arg("compiled")).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "compiled");
        assert_eq!(output.exit_code, Some(0));
    }

    #[test]
    fn run_command_failure_is_not_an_error() {
        let output = run_command(&mut Command::new("false")).unwrap();
        assert!(!output.success);
        assert_ne!(output.exit_code, Some(0));
    }

    #[test]
    fn run_command_missing_binary_names_program() {
        let err = run_command(&mut Command::new("nonexistent_javac_xyz")).unwrap_err();
        assert!(err.to_string().contains("nonexistent_javac_xyz"), "{err}");
    }

    #[test]
    fn tail_prefers_stderr() {
        let output = run_command(
            Command::new("sh")
                .arg("-c")
                .arg("echo out; echo e1 >&2; echo e2 >&2; echo e3 >&2"),
        )
        .unwrap();
        assert_eq!(output.tail(2), "e2\ne3");
    }

    #[test]
    fn tail_falls_back_to_stdout() {
        let output = CommandOutput {
            stdout: "a\n\nb\n".to_owned(),
            stderr: "  \n".to_owned(),
            success: false,
            exit_code: Some(1),
        };
        assert_eq!(output.tail(10), "a\nb");
    }
}
