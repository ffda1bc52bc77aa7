//! Command execution abstraction for testability.
//!
//! The ipset backend never goes through a shell: every kernel operation is
//! a program path plus a discrete argument vector, optionally with data on
//! stdin. This trait lets unit tests replace the subprocess with a mock.

use anyhow::{Context, Result};
use std::io::{ErrorKind, Write};
use std::process::{Command, Output, Stdio};

#[cfg(test)]
use mockall::automock;

/// Output from command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Whether the command exited with status 0
    pub success: bool,
    pub code: Option<i32>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Trait for command execution, allowing dependency injection for testing.
///
/// `args` is `&[String]` rather than `&[&str]` because mockall cannot
/// express the nested lifetime.
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Run `cmd` with `args` and capture its output.
    ///
    /// `Err` means the process could not be started at all; a non-zero exit
    /// is reported through [`CommandOutput::success`].
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput>;

    /// Same as [`CommandExecutor::execute`], writing `stdin` to the child first.
    fn execute_with_stdin(&self, cmd: &str, args: &[String], stdin: &str) -> Result<CommandOutput>;
}

/// Runs real subprocesses.
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, cmd: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute {}", cmd))?;

        Ok(output.into())
    }

    fn execute_with_stdin(
        &self,
        cmd: &str,
        args: &[String],
        stdin_data: &str,
    ) -> Result<CommandOutput> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute {}", cmd))?;

        if let Some(mut stdin) = child.stdin.take() {
            // Dropping stdin at the end of this block closes the pipe
            match stdin.write_all(stdin_data.as_bytes()) {
                Ok(()) => {}
                // The child stopped reading early; its stderr and exit
                // status tell why.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e).with_context(|| format!("Failed to write stdin of {}", cmd));
                }
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", cmd))?;

        Ok(output.into())
    }
}

/// Convert a slice of &str to the owned form the trait takes.
pub fn args_to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_strings() {
        let args = args_to_strings(&["swap", "allow_smtp_tmp", "allow_smtp"]);
        assert_eq!(args, vec!["swap", "allow_smtp_tmp", "allow_smtp"]);
    }

    #[test]
    fn test_command_output_default() {
        let output = CommandOutput::default();
        assert!(output.stdout.is_empty());
        assert!(output.stderr.is_empty());
        assert!(!output.success);
        assert!(output.code.is_none());
    }

    #[test]
    fn test_real_command_executor_execute_echo() {
        let executor = RealCommandExecutor::new();
        let output = executor
            .execute("echo", &args_to_strings(&["-n", "hello"]))
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.code, Some(0));
    }

    #[test]
    fn test_real_command_executor_nonzero_exit() {
        let executor = RealCommandExecutor::new();
        let output = executor
            .execute("ls", &args_to_strings(&["--invalid-flag"]))
            .unwrap();
        assert!(!output.success);
        assert!(!output.stderr.is_empty());
    }

    #[test]
    fn test_real_command_executor_missing_program() {
        let executor = RealCommandExecutor::new();
        let err = executor
            .execute("/nonexistent/ipset", &[])
            .unwrap_err()
            .to_string();
        assert!(err.contains("/nonexistent/ipset"));
    }

    #[test]
    fn test_real_command_executor_execute_with_stdin() {
        let executor = RealCommandExecutor::new();
        let document = "create a_tmp hash:ip family inet hashsize 1024 maxelem 65536\nadd a_tmp 10.0.0.1/32";
        let output = executor.execute_with_stdin("cat", &[], document).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, document);
    }

    #[test]
    fn test_real_command_executor_child_exits_before_reading_stdin() {
        let executor = RealCommandExecutor::new();
        // Far larger than a pipe buffer, so the write hits a closed pipe
        let document = "add a_tmp 10.0.0.1/32\n".repeat(100_000);
        let args = args_to_strings(&[
            "-c",
            "echo 'ipset v7.15: Error in line 1: Hash is full' >&2; exit 1",
        ]);

        let output = executor.execute_with_stdin("sh", &args, &document).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(1));
        assert!(output.stderr.contains("Hash is full"));
    }

    #[test]
    fn test_mock_command_executor_with_stdin() {
        let mut mock = MockCommandExecutor::new();

        mock.expect_execute_with_stdin()
            .withf(|cmd, args, stdin| {
                cmd == "/sbin/ipset" && args == ["restore".to_string(), "-exist".to_string()] && stdin == "doc"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(CommandOutput {
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });

        let args = args_to_strings(&["restore", "-exist"]);
        let output = mock.execute_with_stdin("/sbin/ipset", &args, "doc").unwrap();
        assert!(output.success);
    }
}
