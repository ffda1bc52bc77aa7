//! Per-table orchestration of a single run.
//!
//! Each configured table is fetched and synchronized in turn. A failure
//! only ever affects its own table; the outcomes are collected into a
//! [`RunReport`] that the caller maps to an exit status.

use std::fmt;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::enforcer::SetBackend;
use crate::error::SyncError;
use crate::fetcher::MemberSource;
use crate::fs_abstraction::FileSystem;
use crate::sync::{SetSynchronizer, SyncOutcome};

/// Outcome for one table.
#[derive(Debug)]
pub struct TableReport {
    pub table: String,
    pub outcome: SyncOutcome,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every table is up to date
    Success,
    /// Some tables failed, others were processed
    PartialFailure,
    /// Nothing could be processed
    TotalFailure,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::TotalFailure => 1,
            RunStatus::PartialFailure => 2,
        }
    }
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        ExitCode::from(status.exit_code())
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Success => "success",
            RunStatus::PartialFailure => "partial failure",
            RunStatus::TotalFailure => "total failure",
        })
    }
}

/// Outcomes of every table processed in a run, in configuration order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub tables: Vec<TableReport>,
}

impl RunReport {
    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Changed))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Unchanged))
    }

    pub fn failed(&self) -> usize {
        self.count(SyncOutcome::is_failed)
    }

    pub fn get(&self, table: &str) -> Option<&SyncOutcome> {
        self.tables
            .iter()
            .find(|r| r.table == table)
            .map(|r| &r.outcome)
    }

    pub fn status(&self) -> RunStatus {
        let failed = self.failed();
        if failed == 0 {
            RunStatus::Success
        } else if failed == self.tables.len() {
            RunStatus::TotalFailure
        } else {
            RunStatus::PartialFailure
        }
    }

    fn count<P: Fn(&SyncOutcome) -> bool>(&self, predicate: P) -> usize {
        self.tables.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// Fetch and synchronize every table of `config`, one after the other.
pub async fn run_tables<S, B, F>(
    config: &Config,
    source: &S,
    synchronizer: &SetSynchronizer<B, F>,
) -> RunReport
where
    S: MemberSource + ?Sized,
    B: SetBackend,
    F: FileSystem,
{
    let mut report = RunReport::default();

    for table in &config.tables {
        let spec = table.spec();
        let url = config.endpoint_for(table);

        info!(table = %spec.name, "Fetching members from {}", url);
        let outcome = match source.fetch_members(&spec.name, url).await {
            Ok(members) => synchronizer.synchronize(&spec, &members),
            Err(e) => {
                error!(table = %spec.name, "Fetch failed, skipping table: {:#}", e);
                SyncOutcome::Failed(SyncError::FetchUnavailable {
                    table: spec.name.clone(),
                    reason: format!("{:#}", e),
                })
            }
        };

        match outcome {
            SyncOutcome::Failed(ref e) => warn!(table = e.table(), "Table not synchronized: {}", e),
            ref done => debug!(table = %spec.name, outcome = done.label(), "Table processed"),
        }

        report.tables.push(TableReport {
            table: spec.name,
            outcome,
        });
    }

    info!(
        changed = report.changed(),
        unchanged = report.unchanged(),
        failed = report.failed(),
        "Run complete: {}",
        report.status()
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, TableConfig};
    use crate::enforcer::MockSetBackend;
    use crate::store::DocumentStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves fixed lists keyed by table name; missing tables fail.
    struct StaticSource(HashMap<String, Vec<String>>);

    impl StaticSource {
        fn new(entries: Vec<(&str, Vec<&str>)>) -> Self {
            Self(
                entries
                    .into_iter()
                    .map(|(t, m)| (t.to_string(), m.into_iter().map(String::from).collect()))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl MemberSource for StaticSource {
        async fn fetch_members(&self, table: &str, _url: &str) -> anyhow::Result<Vec<String>> {
            self.0
                .get(table)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("HTTP 503 Service Unavailable"))
        }
    }

    fn config(tables: &[&str]) -> Config {
        Config {
            api: ApiConfig {
                url: "https://api.example.net/allowlist".to_string(),
                ..Default::default()
            },
            tables: tables
                .iter()
                .map(|name| TableConfig {
                    name: name.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn report(outcomes: Vec<SyncOutcome>) -> RunReport {
        RunReport {
            tables: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| TableReport {
                    table: format!("t{}", i),
                    outcome,
                })
                .collect(),
        }
    }

    fn empty_failure() -> SyncOutcome {
        SyncOutcome::Failed(SyncError::EmptyMemberList {
            table: "t".to_string(),
        })
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(report(vec![]).status(), RunStatus::Success);
        assert_eq!(
            report(vec![SyncOutcome::Changed, SyncOutcome::Unchanged]).status(),
            RunStatus::Success
        );
        assert_eq!(
            report(vec![SyncOutcome::Changed, empty_failure()]).status(),
            RunStatus::PartialFailure
        );
        assert_eq!(
            report(vec![empty_failure(), empty_failure()]).status(),
            RunStatus::TotalFailure
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::TotalFailure.exit_code(), 1);
        assert_eq!(RunStatus::PartialFailure.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_table_only() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = MockSetBackend::new();
        backend
            .expect_restore()
            .withf(|doc| doc.as_str().starts_with("create allow_ssh_tmp "))
            .times(1)
            .returning(|_| Ok(()));
        backend
            .expect_swap()
            .withf(|from, to| from == "allow_ssh_tmp" && to == "allow_ssh")
            .times(1)
            .returning(|_, _| Ok(()));
        backend
            .expect_destroy()
            .withf(|name| name == "allow_ssh_tmp")
            .times(1)
            .returning(|_| Ok(()));

        let sync = SetSynchronizer::new(backend, DocumentStore::new(temp_dir.path()));
        let source = StaticSource::new(vec![("allow_ssh", vec!["198.51.100.7"])]);
        let report = run_tables(&config(&["allow_smtp", "allow_ssh"]), &source, &sync).await;

        assert_eq!(report.tables.len(), 2);
        assert!(matches!(
            report.get("allow_smtp"),
            Some(SyncOutcome::Failed(SyncError::FetchUnavailable { .. }))
        ));
        assert!(matches!(report.get("allow_ssh"), Some(SyncOutcome::Changed)));
        assert_eq!(report.status(), RunStatus::PartialFailure);
        // Skipped table leaves no state behind
        assert!(sync.store().load("allow_smtp").document.is_none());
    }

    #[tokio::test]
    async fn test_all_fetches_fail_is_total_failure() {
        let temp_dir = TempDir::new().unwrap();
        let sync = SetSynchronizer::new(MockSetBackend::new(), DocumentStore::new(temp_dir.path()));
        let source = StaticSource::new(vec![]);

        let report = run_tables(&config(&["allow_smtp"]), &source, &sync).await;
        assert_eq!(report.failed(), 1);
        assert_eq!(report.status(), RunStatus::TotalFailure);
    }

    #[tokio::test]
    async fn test_report_keeps_config_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = MockSetBackend::new();
        backend.expect_restore().returning(|_| Ok(()));
        backend.expect_swap().returning(|_, _| Ok(()));
        backend.expect_destroy().returning(|_| Ok(()));

        let sync = SetSynchronizer::new(backend, DocumentStore::new(temp_dir.path()));
        let source = StaticSource::new(vec![
            ("b_set", vec!["10.0.0.2"]),
            ("a_set", vec!["10.0.0.1"]),
        ]);
        let report = run_tables(&config(&["b_set", "a_set"]), &source, &sync).await;

        let names: Vec<&str> = report.tables.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(names, vec!["b_set", "a_set"]);
        assert_eq!(report.changed(), 2);
    }
}
