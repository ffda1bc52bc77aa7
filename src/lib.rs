//! # allowsync - remote allow-lists to kernel ipsets
//!
//! Fetches IP allow-lists from an HTTP API and loads them into kernel IP
//! sets. A set is rebuilt only when its content changed, and the new
//! content replaces the live set atomically, so firewall rules matching on
//! the set never see it empty or half-filled.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        allowsync                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)  ──  run (default), version                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml + env overrides)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Runner: for each table, sequentially                       │
//! │    Fetcher (reqwest + rustls)  ──  MemberSource             │
//! │    SetSynchronizer                                          │
//! │      normalize → CommandDocument → diff vs DocumentStore    │
//! │      → persist → restore / swap / destroy                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Enforcer (SetBackend trait)                                │
//! │    └── IpsetBackend (ipset restore -exist / swap / destroy) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use allowsync::document::TableSpec;
//! use allowsync::enforcer::IpsetBackend;
//! use allowsync::store::DocumentStore;
//! use allowsync::sync::{SetSynchronizer, SyncOutcome};
//!
//! let synchronizer = SetSynchronizer::new(
//!     IpsetBackend::default(),
//!     DocumentStore::new("/var/lib/allowsync"),
//! );
//!
//! let spec = TableSpec::new("allow_smtp").with_sizing(1024, 65536);
//! let members = vec!["192.0.2.5".to_string(), "203.0.113.0/24".to_string()];
//!
//! match synchronizer.synchronize(&spec, &members) {
//!     SyncOutcome::Changed => println!("allow_smtp updated"),
//!     SyncOutcome::Unchanged => println!("allow_smtp already up to date"),
//!     SyncOutcome::Failed(e) => eprintln!("{}", e),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`cmd_abstraction`] - Mockable subprocess execution
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`document`] - Table specs, member normalization, restore documents
//! - [`enforcer`] - Kernel set backend abstraction (ipset)
//! - [`error`] - Per-table error types
//! - [`fetcher`] - HTTP client for the allow-list API
//! - [`fs_abstraction`] - Mockable filesystem with atomic writes
//! - [`lock`] - File locking against concurrent runs
//! - [`runner`] - Per-table orchestration and exit status
//! - [`store`] - Persisted command documents
//! - [`sync`] - Change-detecting atomic set synchronization
//! - [`validation`] - Address, set name and URL validation

pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod document;
pub mod enforcer;
pub mod error;
pub mod fetcher;
pub mod fs_abstraction;
pub mod lock;
pub mod runner;
pub mod store;
pub mod sync;
pub mod validation;

pub use config::Config;
pub use document::{CommandDocument, Family, MemberList, TableSpec};
pub use error::SyncError;
pub use sync::{SetSynchronizer, SyncOutcome};
