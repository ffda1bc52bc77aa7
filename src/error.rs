//! Error types for allowsync.

use std::fmt;
use thiserror::Error;

/// One of the three kernel commands of the apply sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStep {
    /// Bulk-load the staging set from the command document
    Restore,
    /// Swap the staging set into the live name
    Swap,
    /// Destroy the staging set holding the previous contents
    Destroy,
}

impl fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyStep::Restore => "restore",
            ApplyStep::Swap => "swap",
            ApplyStep::Destroy => "destroy",
        })
    }
}

/// A failed apply command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub step: ApplyStep,
    pub message: String,
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}

/// Why a table was not brought up to date during this run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No data available for {table}: {reason}")]
    FetchUnavailable { table: String, reason: String },

    #[error("Refusing to load an empty member list into {table}")]
    EmptyMemberList { table: String },

    #[error("{table} has {count} members, more than its maxelem of {maxelem}")]
    MemberLimitExceeded {
        table: String,
        count: usize,
        maxelem: u32,
    },

    #[error("Failed to persist command document for {table}: {source}")]
    PersistWriteFailed {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Apply failed for {table}: {}", join_failures(.failures))]
    ApplyCommandFailed {
        table: String,
        failures: Vec<ApplyFailure>,
    },
}

impl SyncError {
    /// Name of the table the error belongs to.
    pub fn table(&self) -> &str {
        match self {
            SyncError::FetchUnavailable { table, .. }
            | SyncError::EmptyMemberList { table }
            | SyncError::MemberLimitExceeded { table, .. }
            | SyncError::PersistWriteFailed { table, .. }
            | SyncError::ApplyCommandFailed { table, .. } => table,
        }
    }
}

fn join_failures(failures: &[ApplyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
