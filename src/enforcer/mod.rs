//! Kernel set enforcement.
//!
//! The apply sequence only needs three kernel primitives, expressed by
//! [`SetBackend`]: bulk-load a restore document, atomically swap two sets,
//! destroy a set. [`IpsetBackend`] implements them on top of the `ipset`
//! userspace tool.

mod ipset;

use anyhow::Result;

pub use ipset::{IpsetBackend, DEFAULT_IPSET_PATH};

use crate::document::CommandDocument;

#[cfg(test)]
use mockall::automock;

/// Narrow interface to the kernel IP set subsystem.
#[cfg_attr(test, automock)]
pub trait SetBackend: Send + Sync {
    /// Bulk-load `document`; entries that already exist are not errors.
    fn restore(&self, document: &CommandDocument) -> Result<()>;

    /// Atomically exchange the contents of sets `from` and `to`.
    fn swap(&self, from: &str, to: &str) -> Result<()>;

    /// Destroy set `name`.
    fn destroy(&self, name: &str) -> Result<()>;
}

/// Check if running as root (effective UID == 0)
///
/// Creating, swapping and destroying sets needs CAP_NET_ADMIN; UID 0 covers
/// the usual deployment as a root cron job or systemd timer.
pub fn check_root() -> Result<()> {
    // SAFETY: geteuid() is a simple syscall that reads the effective user ID.
    // It has no preconditions, never fails, and doesn't modify any state.
    let euid = unsafe { libc::geteuid() };

    if euid != 0 {
        anyhow::bail!(
            "This operation requires root privileges. Please run with sudo.\n\
             Alternatively, ensure the process has the CAP_NET_ADMIN capability."
        )
    }
    Ok(())
}
