//! allowsync - keep kernel ipsets in sync with a remote allow-list API.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use allowsync::cli::{Cli, Commands};
use allowsync::runner::RunStatus;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.subcommand() {
        Commands::Run => match allowsync::commands::run::run(&cli.config).await {
            Ok(report) => report.status().into(),
            Err(e) => {
                error!("{:#}", e);
                error!("Run aborted: {}", RunStatus::TotalFailure);
                RunStatus::TotalFailure.into()
            }
        },
        Commands::Version => {
            println!("allowsync {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
    }
}
