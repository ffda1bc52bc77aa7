//! Change-detecting set synchronization.
//!
//! [`SetSynchronizer::synchronize`] turns a freshly fetched member list into
//! a command document, compares it with the persisted one and, only when it
//! differs (or was never applied), persists it and runs the apply sequence:
//!
//! 1. `restore`: build `<name>_tmp` from the document
//! 2. `swap`: exchange `<name>_tmp` and `<name>`
//! 3. `destroy`: drop `<name>_tmp`, now holding the previous contents
//!
//! The live set name always resolves to a complete set.

use tracing::{debug, error, info, warn};

use crate::document::{CommandDocument, MemberList, TableSpec};
use crate::enforcer::SetBackend;
use crate::error::{ApplyFailure, ApplyStep, SyncError};
use crate::fs_abstraction::{FileSystem, RealFileSystem};
use crate::store::DocumentStore;

const APPLY_SEQUENCE: [ApplyStep; 3] = [ApplyStep::Restore, ApplyStep::Swap, ApplyStep::Destroy];

/// Result of synchronizing one table.
#[derive(Debug)]
pub enum SyncOutcome {
    /// A new document was written and applied
    Changed,
    /// The persisted document already matched; nothing was done
    Unchanged,
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Changed => "changed",
            SyncOutcome::Unchanged => "unchanged",
            SyncOutcome::Failed(_) => "failed",
        }
    }
}

/// Keeps kernel sets in line with fetched member lists.
pub struct SetSynchronizer<B, F = RealFileSystem> {
    backend: B,
    store: DocumentStore<F>,
}

impl<B: SetBackend, F: FileSystem> SetSynchronizer<B, F> {
    pub fn new(backend: B, store: DocumentStore<F>) -> Self {
        Self { backend, store }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &DocumentStore<F> {
        &self.store
    }

    /// Bring the set described by `spec` in line with `members`.
    ///
    /// Never panics and never returns early with an error: every problem is
    /// reported as [`SyncOutcome::Failed`] so callers can go on with other
    /// tables.
    ///
    /// The document is persisted before the kernel is touched. If the apply
    /// then fails, the document stays marked as pending and the identical
    /// apply is retried on every following run until it succeeds or the
    /// member list changes.
    pub fn synchronize(&self, spec: &TableSpec, members: &[String]) -> SyncOutcome {
        let table = spec.name.as_str();

        let members = MemberList::normalize_for(spec, members);
        if members.is_empty() && !spec.allow_empty {
            warn!(table, "No valid members, keeping the current set");
            return SyncOutcome::Failed(SyncError::EmptyMemberList {
                table: table.to_string(),
            });
        }

        // restore would stop at the limit and swap in a truncated set
        if members.len() > spec.maxelem as usize {
            error!(
                table,
                members = members.len(),
                maxelem = spec.maxelem,
                "Member list exceeds maxelem, keeping the current set"
            );
            return SyncOutcome::Failed(SyncError::MemberLimitExceeded {
                table: table.to_string(),
                count: members.len(),
                maxelem: spec.maxelem,
            });
        }

        let document = CommandDocument::build(spec, &members);
        let persisted = self.store.load(table);
        let same_document = persisted
            .document
            .as_deref()
            .is_some_and(|previous| document.matches(previous));

        if same_document && !persisted.pending {
            info!(table, members = members.len(), "No changes");
            return SyncOutcome::Unchanged;
        }

        if same_document {
            warn!(table, "Previous apply did not complete, retrying");
        } else {
            info!(
                table,
                members = members.len(),
                first_run = persisted.document.is_none(),
                "Command document changed"
            );
        }

        if let Err(e) = self.store.save(table, &document) {
            error!(table, "Failed to persist command document: {}", e);
            return SyncOutcome::Failed(SyncError::PersistWriteFailed {
                table: table.to_string(),
                source: e,
            });
        }
        info!(
            table,
            "Command document written to {:?}",
            self.store.document_path(table)
        );

        let failures = self.apply(spec, &document, persisted.pending);
        if !failures.is_empty() {
            return SyncOutcome::Failed(SyncError::ApplyCommandFailed {
                table: table.to_string(),
                failures,
            });
        }

        if let Err(e) = self.store.clear_pending(table) {
            warn!(
                table,
                "Applied, but failed to clear pending marker (next run re-applies): {}", e
            );
        }

        info!(table, members = members.len(), "Set updated");
        SyncOutcome::Changed
    }

    /// Run the apply sequence. Every step is attempted regardless of
    /// earlier failures; all failures are returned.
    fn apply(
        &self,
        spec: &TableSpec,
        document: &CommandDocument,
        leftover_staging: bool,
    ) -> Vec<ApplyFailure> {
        let table = spec.name.as_str();
        let staging = spec.staging_name();

        // A failed run may have left a populated staging set behind;
        // restore would merge into it.
        if leftover_staging {
            debug!(table, set = %staging, "Destroying leftover staging set");
            if let Err(e) = self.backend.destroy(&staging) {
                debug!(table, set = %staging, "No leftover staging set removed: {:#}", e);
            }
        }

        let mut failures = Vec::new();
        for step in APPLY_SEQUENCE {
            info!(table, command = %step, "Issuing apply command");
            let result = match step {
                ApplyStep::Restore => self.backend.restore(document),
                ApplyStep::Swap => self.backend.swap(&staging, &spec.name),
                ApplyStep::Destroy => self.backend.destroy(&staging),
            };

            if let Err(e) = result {
                error!(table, command = %step, "Apply command failed: {:#}", e);
                failures.push(ApplyFailure {
                    step,
                    message: format!("{:#}", e),
                });
            }
        }

        failures
    }
}
