//! ipset backend implementation.

use anyhow::Result;
use tracing::debug;

use super::SetBackend;
use crate::cmd_abstraction::{args_to_strings, CommandExecutor, RealCommandExecutor};
use crate::document::CommandDocument;

pub const DEFAULT_IPSET_PATH: &str = "/sbin/ipset";

/// Drives the kernel through the `ipset` command line tool.
#[derive(Debug, Clone)]
pub struct IpsetBackend<E = RealCommandExecutor> {
    program: String,
    executor: E,
}

impl IpsetBackend<RealCommandExecutor> {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_executor(program, RealCommandExecutor::new())
    }
}

impl Default for IpsetBackend<RealCommandExecutor> {
    fn default() -> Self {
        Self::new(DEFAULT_IPSET_PATH)
    }
}

impl<E: CommandExecutor> IpsetBackend<E> {
    pub fn with_executor(program: impl Into<String>, executor: E) -> Self {
        Self {
            program: program.into(),
            executor,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<()> {
        let argv = args_to_strings(args);
        debug!("Running {} {}", self.program, args.join(" "));

        let output = match stdin {
            Some(data) => self
                .executor
                .execute_with_stdin(&self.program, &argv, data)?,
            None => self.executor.execute(&self.program, &argv)?,
        };

        if output.success {
            return Ok(());
        }

        let status = output
            .code
            .map(|c| format!("exit code {}", c))
            .unwrap_or_else(|| "killed by signal".to_string());
        anyhow::bail!(
            "ipset {} failed ({}): {}",
            args.first().copied().unwrap_or_default(),
            status,
            output.stderr.trim()
        )
    }
}

impl<E: CommandExecutor> SetBackend for IpsetBackend<E> {
    fn restore(&self, document: &CommandDocument) -> Result<()> {
        self.run(&["restore", "-exist"], Some(document.as_str()))
    }

    fn swap(&self, from: &str, to: &str) -> Result<()> {
        self.run(&["swap", from, to], None)
    }

    fn destroy(&self, name: &str) -> Result<()> {
        self.run(&["destroy", name], None)
    }
}
